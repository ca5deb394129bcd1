use std::sync::Arc;
use uuid::Uuid;
use crate::{
    auth::{Actor, AuthService},
    domain::*,
    error::{AppError, Result},
    repository::{DepartmentRepository, UserRepository},
};

pub const MIN_PASSWORD_LENGTH: usize = 8;

pub struct UserService {
    repo: Arc<dyn UserRepository>,
    department_repo: Arc<dyn DepartmentRepository>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>, department_repo: Arc<dyn DepartmentRepository>) -> Self {
        Self { repo, department_repo }
    }

    pub async fn create_user(&self, request: CreateUserRequest) -> Result<User> {
        let request = request.normalized();

        if request.username.is_empty() {
            return Err(AppError::Validation("Username is required.".to_string()));
        }
        if request.password.len() < MIN_PASSWORD_LENGTH {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters.",
                MIN_PASSWORD_LENGTH
            )));
        }

        if self.repo.find_by_username(&request.username).await?.is_some() {
            return Err(AppError::Conflict("Username already exists".to_string()));
        }

        let hash = AuthService::hash_password(&request.password).await?;
        let user = self.repo.create(request, hash).await?;

        tracing::info!("Created user {} ({})", user.username, user.role.as_str());
        Ok(user)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.repo.find_by_id(id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<User> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        self.repo.list().await
    }

    /// Builds the policy view of a user, including the departments they manage.
    pub async fn actor_for(&self, user: &User) -> Result<Actor> {
        let managed = self.department_repo.managed_ids(user.id).await?;
        Ok(Actor::new(user, managed))
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<()> {
        let hash = self
            .repo
            .get_password_hash(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if !AuthService::verify_password(current_password, &hash).await? {
            return Err(AppError::Validation("Your current password is incorrect.".to_string()));
        }
        if new_password != confirm_password {
            return Err(AppError::Validation("The new passwords do not match.".to_string()));
        }
        if new_password.len() < MIN_PASSWORD_LENGTH {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters.",
                MIN_PASSWORD_LENGTH
            )));
        }

        let new_hash = AuthService::hash_password(new_password).await?;
        self.repo.update_password_hash(user_id, &new_hash).await?;

        tracing::info!("Password changed for user {}", user_id);
        Ok(())
    }
}
