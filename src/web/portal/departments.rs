use std::collections::HashMap;

use askama::Template;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Extension,
};
use axum_extra::extract::Form;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::{
        middleware::auth::{CurrentUser, SessionInfo},
        state::AppState,
    },
    auth::{authorize, Action, Resource},
    domain::{CreateDepartmentRequest, Department, MembershipKind, User},
    error::{AppError, Result},
    web::templates::{HtmlTemplate, UserInfo},
};
use super::{csrf_token, redirect_with_notice, NoticeQuery, SelectOption};

pub struct DepartmentRow {
    pub id: String,
    pub name: String,
    pub managers: String,
    pub members_count: usize,
    pub can_rename: bool,
    pub can_manage_managers: bool,
    pub can_manage_members: bool,
}

#[derive(Template)]
#[template(path = "departments/list.html")]
pub struct DepartmentsTemplate {
    pub user: UserInfo,
    pub csrf_token: String,
    pub departments: Vec<DepartmentRow>,
    pub can_create: bool,
    pub notice: Option<String>,
}

pub async fn departments_page(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(session_info): Extension<SessionInfo>,
    Query(query): Query<NoticeQuery>,
) -> Result<Response> {
    let ctx = &state.service_context;
    let actor = &current_user.actor;

    let departments = ctx.department_service.list_for(actor).await?;
    let names: HashMap<Uuid, String> = ctx
        .user_service
        .list()
        .await?
        .into_iter()
        .map(|u| (u.id, u.display_name().to_string()))
        .collect();

    let rows = departments
        .iter()
        .map(|d| {
            let allowed = |action| authorize(actor, action, Resource::Department(d)).is_allowed();
            let mut managers: Vec<&str> = d
                .manager_ids
                .iter()
                .filter_map(|id| names.get(id).map(String::as_str))
                .collect();
            managers.sort_unstable();
            DepartmentRow {
                id: d.id.to_string(),
                name: d.name.clone(),
                managers: managers.join(", "),
                members_count: d.members_count(),
                can_rename: allowed(Action::Edit),
                can_manage_managers: allowed(Action::ManageManagers),
                can_manage_members: allowed(Action::ManageMembers),
            }
        })
        .collect();

    Ok(HtmlTemplate(DepartmentsTemplate {
        user: UserInfo::from(&current_user),
        csrf_token: csrf_token(&state, &session_info).await?,
        departments: rows,
        can_create: authorize(actor, Action::Create, Resource::DepartmentDirectory).is_allowed(),
        notice: query.notice,
    })
    .into_response())
}

// ---------------------------------------------------------------------------
// Create / rename
// ---------------------------------------------------------------------------

#[derive(Template)]
#[template(path = "departments/form.html")]
pub struct DepartmentFormTemplate {
    pub user: UserInfo,
    pub csrf_token: String,
    pub heading: String,
    pub action: String,
    pub name: String,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DepartmentForm {
    #[serde(default)]
    pub name: String,
}

async fn render_department_form(
    state: &AppState,
    current_user: &CurrentUser,
    session_info: &SessionInfo,
    existing: Option<Uuid>,
    name: String,
    error: Option<String>,
) -> Result<Response> {
    let (heading, action) = match existing {
        Some(id) => ("Rename department".to_string(), format!("/departments/{}/edit/", id)),
        None => ("New department".to_string(), "/departments/create/".to_string()),
    };

    Ok(HtmlTemplate(DepartmentFormTemplate {
        user: UserInfo::from(current_user),
        csrf_token: csrf_token(state, session_info).await?,
        heading,
        action,
        name,
        error,
    })
    .into_response())
}

pub async fn create_department_page(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(session_info): Extension<SessionInfo>,
) -> Result<Response> {
    authorize(&current_user.actor, Action::Create, Resource::DepartmentDirectory).into_result()?;
    render_department_form(&state, &current_user, &session_info, None, String::new(), None).await
}

pub async fn create_department(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(session_info): Extension<SessionInfo>,
    Form(form): Form<DepartmentForm>,
) -> Result<Response> {
    let result = state
        .service_context
        .department_service
        .create(
            &current_user.actor,
            CreateDepartmentRequest {
                name: form.name.clone(),
            },
        )
        .await;

    match result {
        Ok(department) => Ok(redirect_with_notice(
            "/departments/",
            &format!("Department {} created.", department.name),
        )
        .into_response()),
        Err(e) if e.is_form_error() => {
            let message = e.user_message();
            render_department_form(&state, &current_user, &session_info, None, form.name, Some(message)).await
        }
        Err(e) => Err(e),
    }
}

pub async fn edit_department_page(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(session_info): Extension<SessionInfo>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let department = state
        .service_context
        .department_service
        .get(&current_user.actor, id)
        .await?;
    authorize(&current_user.actor, Action::Edit, Resource::Department(&department)).into_result()?;

    render_department_form(&state, &current_user, &session_info, Some(id), department.name, None).await
}

pub async fn rename_department(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(session_info): Extension<SessionInfo>,
    Path(id): Path<Uuid>,
    Form(form): Form<DepartmentForm>,
) -> Result<Response> {
    let result = state
        .service_context
        .department_service
        .rename(&current_user.actor, id, &form.name)
        .await;

    match result {
        Ok(_) => Ok(redirect_with_notice("/departments/", "Department renamed.").into_response()),
        Err(e) if e.is_form_error() => {
            let message = e.user_message();
            render_department_form(&state, &current_user, &session_info, Some(id), form.name, Some(message)).await
        }
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// Managers and members
// ---------------------------------------------------------------------------

#[derive(Template)]
#[template(path = "departments/membership.html")]
pub struct MembershipTemplate {
    pub user: UserInfo,
    pub csrf_token: String,
    pub department_name: String,
    pub kind_label: String,
    pub action: String,
    pub options: Vec<SelectOption>,
    pub hint: String,
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MembershipForm {
    #[serde(default)]
    pub user_ids: Vec<String>,
}

impl MembershipForm {
    fn parse_ids(&self) -> Result<Vec<Uuid>> {
        self.user_ids
            .iter()
            .map(|id| {
                Uuid::parse_str(id.trim())
                    .map_err(|_| AppError::Validation("Unknown user selected.".to_string()))
            })
            .collect()
    }
}

fn user_options(candidates: &[User], selected: &[Uuid]) -> Vec<SelectOption> {
    let mut options: Vec<SelectOption> = candidates
        .iter()
        .map(|u| SelectOption {
            value: u.id.to_string(),
            label: format!("{} ({})", u.display_name(), u.username),
            selected: selected.contains(&u.id),
        })
        .collect();
    options.sort_by(|a, b| a.label.to_lowercase().cmp(&b.label.to_lowercase()));
    options
}

#[allow(clippy::too_many_arguments)]
async fn render_membership(
    state: &AppState,
    current_user: &CurrentUser,
    session_info: &SessionInfo,
    department: &Department,
    kind: MembershipKind,
    candidates: &[User],
    selected: &[Uuid],
    error: Option<String>,
) -> Result<Response> {
    let (path, hint) = match kind {
        MembershipKind::Managers => (
            "managers",
            "Managers and general managers can manage a department.",
        ),
        MembershipKind::Members => (
            "members",
            "Employees belong to one department. Checking someone here moves them.",
        ),
    };

    Ok(HtmlTemplate(MembershipTemplate {
        user: UserInfo::from(current_user),
        csrf_token: csrf_token(state, session_info).await?,
        department_name: department.name.clone(),
        kind_label: kind.label().to_string(),
        action: format!("/departments/{}/{}/", department.id, path),
        options: user_options(candidates, selected),
        hint: hint.to_string(),
        error,
    })
    .into_response())
}

pub async fn managers_page(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(session_info): Extension<SessionInfo>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let service = &state.service_context.department_service;
    let department = service.get(&current_user.actor, id).await?;
    authorize(&current_user.actor, Action::ManageManagers, Resource::Department(&department)).into_result()?;

    let candidates = service.eligible_managers().await?;
    render_membership(
        &state,
        &current_user,
        &session_info,
        &department,
        MembershipKind::Managers,
        &candidates,
        &department.manager_ids,
        None,
    )
    .await
}

pub async fn update_managers(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(session_info): Extension<SessionInfo>,
    Path(id): Path<Uuid>,
    Form(form): Form<MembershipForm>,
) -> Result<Response> {
    update_membership(&state, &current_user, &session_info, id, MembershipKind::Managers, form).await
}

pub async fn members_page(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(session_info): Extension<SessionInfo>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let service = &state.service_context.department_service;
    let department = service.get(&current_user.actor, id).await?;
    authorize(&current_user.actor, Action::ManageMembers, Resource::Department(&department)).into_result()?;

    let candidates = service.eligible_members().await?;
    render_membership(
        &state,
        &current_user,
        &session_info,
        &department,
        MembershipKind::Members,
        &candidates,
        &department.member_ids,
        None,
    )
    .await
}

pub async fn update_members(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(session_info): Extension<SessionInfo>,
    Path(id): Path<Uuid>,
    Form(form): Form<MembershipForm>,
) -> Result<Response> {
    update_membership(&state, &current_user, &session_info, id, MembershipKind::Members, form).await
}

async fn update_membership(
    state: &AppState,
    current_user: &CurrentUser,
    session_info: &SessionInfo,
    id: Uuid,
    kind: MembershipKind,
    form: MembershipForm,
) -> Result<Response> {
    let service = &state.service_context.department_service;
    let actor = &current_user.actor;

    let result = match form.parse_ids() {
        Ok(desired) => match kind {
            MembershipKind::Managers => service.apply_manager_plan(actor, id, &desired).await,
            MembershipKind::Members => service.apply_member_plan(actor, id, &desired).await,
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(department) => Ok(redirect_with_notice(
            "/departments/",
            &format!("Updated {} of {}.", kind.label(), department.name),
        )
        .into_response()),
        Err(e) if e.is_form_error() => {
            // Nothing was written; show the form again with the submitted selection.
            let department = service.get(actor, id).await?;
            let candidates = match kind {
                MembershipKind::Managers => service.eligible_managers().await?,
                MembershipKind::Members => service.eligible_members().await?,
            };
            let selected = form.parse_ids().unwrap_or_default();
            render_membership(
                state,
                current_user,
                session_info,
                &department,
                kind,
                &candidates,
                &selected,
                Some(e.user_message()),
            )
            .await
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership_form_rejects_garbage_ids() {
        let form = MembershipForm {
            user_ids: vec![Uuid::new_v4().to_string(), "not-a-uuid".to_string()],
        };
        assert!(matches!(form.parse_ids(), Err(AppError::Validation(_))));

        let form = MembershipForm::default();
        assert!(form.parse_ids().unwrap().is_empty());
    }
}
