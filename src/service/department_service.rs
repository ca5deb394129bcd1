use std::sync::Arc;
use uuid::Uuid;
use crate::{
    auth::{authorize, Action, Actor, Resource},
    domain::*,
    error::{AppError, Result},
    repository::{DepartmentRepository, UserRepository},
};

pub struct DepartmentService {
    repo: Arc<dyn DepartmentRepository>,
    user_repo: Arc<dyn UserRepository>,
}

impl DepartmentService {
    pub fn new(repo: Arc<dyn DepartmentRepository>, user_repo: Arc<dyn UserRepository>) -> Self {
        Self { repo, user_repo }
    }

    /// GMs see every department, managers the ones they manage.
    pub async fn list_for(&self, actor: &Actor) -> Result<Vec<Department>> {
        authorize(actor, Action::View, Resource::DepartmentDirectory).into_result()?;

        if actor.is_gm() {
            self.repo.list().await
        } else {
            self.repo.list_managed_by(actor.user_id).await
        }
    }

    /// All departments, for target pickers.
    pub async fn list_all(&self) -> Result<Vec<Department>> {
        self.repo.list().await
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<Department> {
        let department = self.find(id).await?;
        authorize(actor, Action::View, Resource::Department(&department)).into_result()?;
        Ok(department)
    }

    pub async fn create(&self, actor: &Actor, request: CreateDepartmentRequest) -> Result<Department> {
        authorize(actor, Action::Create, Resource::DepartmentDirectory).into_result()?;

        let name = Self::clean_name(&request.name)?;
        if self.repo.find_by_name(&name).await?.is_some() {
            return Err(AppError::Conflict("A department with this name already exists.".to_string()));
        }

        let department = self.repo.create(&name).await?;
        tracing::info!("Department {} created", department.name);
        Ok(department)
    }

    pub async fn rename(&self, actor: &Actor, id: Uuid, name: &str) -> Result<Department> {
        let department = self.find(id).await?;
        authorize(actor, Action::Edit, Resource::Department(&department)).into_result()?;

        let name = Self::clean_name(name)?;
        if let Some(existing) = self.repo.find_by_name(&name).await? {
            if existing.id != id {
                return Err(AppError::Conflict("A department with this name already exists.".to_string()));
            }
        }

        let renamed = self.repo.rename(id, &name).await?;
        tracing::info!("Department {} renamed to {}", department.name, renamed.name);
        Ok(renamed)
    }

    /// Replaces the member set with `desired`. Only employees can be members;
    /// a user added here leaves whatever department they were in before.
    pub async fn apply_member_plan(&self, actor: &Actor, id: Uuid, desired: &[Uuid]) -> Result<Department> {
        let department = self.find(id).await?;
        authorize(actor, Action::ManageMembers, Resource::Department(&department)).into_result()?;

        let plan = MembershipPlan::diff(id, MembershipKind::Members, &department.member_ids, desired);
        self.apply(plan, &[Role::Employee]).await
    }

    /// Replaces the manager set with `desired`. Managers and GMs are eligible.
    pub async fn apply_manager_plan(&self, actor: &Actor, id: Uuid, desired: &[Uuid]) -> Result<Department> {
        let department = self.find(id).await?;
        authorize(actor, Action::ManageManagers, Resource::Department(&department)).into_result()?;

        let plan = MembershipPlan::diff(id, MembershipKind::Managers, &department.manager_ids, desired);
        self.apply(plan, &[Role::Manager, Role::GeneralManager]).await
    }

    /// Moves a single employee into the department.
    pub async fn assign_member(&self, actor: &Actor, user_id: Uuid, id: Uuid) -> Result<Department> {
        let department = self.find(id).await?;
        authorize(actor, Action::ManageMembers, Resource::Department(&department)).into_result()?;

        if department.has_member(user_id) {
            return Ok(department);
        }

        let plan = MembershipPlan {
            department_id: id,
            kind: MembershipKind::Members,
            to_add: vec![user_id],
            to_remove: vec![],
        };
        self.apply(plan, &[Role::Employee]).await
    }

    pub async fn eligible_members(&self) -> Result<Vec<User>> {
        self.user_repo.list_by_roles(&[Role::Employee]).await
    }

    pub async fn eligible_managers(&self) -> Result<Vec<User>> {
        self.user_repo
            .list_by_roles(&[Role::Manager, Role::GeneralManager])
            .await
    }

    async fn apply(&self, plan: MembershipPlan, eligible: &[Role]) -> Result<Department> {
        if plan.is_empty() {
            return self.find(plan.department_id).await;
        }

        // Validate everything before the first write.
        for user_id in &plan.to_add {
            let user = self
                .user_repo
                .find_by_id(*user_id)
                .await?
                .ok_or_else(|| AppError::Validation(format!("Unknown user {}.", user_id)))?;

            if !eligible.contains(&user.role) {
                tracing::warn!(
                    "Rejected {} plan for department {}: {} is a {}",
                    plan.kind.label(),
                    plan.department_id,
                    user.username,
                    user.role.as_str()
                );
                return Err(AppError::Validation(format!(
                    "{} cannot be added to {}: role {} is not eligible.",
                    user.display_name(),
                    plan.kind.label(),
                    user.role.label()
                )));
            }
        }

        let department = self.repo.apply_plan(&plan).await?;
        tracing::info!(
            "Department {} {}: {} added, {} removed",
            department.name,
            plan.kind.label(),
            plan.to_add.len(),
            plan.to_remove.len()
        );
        Ok(department)
    }

    async fn find(&self, id: Uuid) -> Result<Department> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Department not found".to_string()))
    }

    fn clean_name(name: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Department name is required.".to_string()));
        }
        if name.chars().count() > 100 {
            return Err(AppError::Validation(
                "Department name must be at most 100 characters.".to_string(),
            ));
        }
        Ok(name.to_string())
    }
}
