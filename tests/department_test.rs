mod common;

use intranet::{domain::Role, error::AppError};

#[tokio::test]
async fn test_member_moves_between_departments() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let (_, gm) = common::gm(&ctx).await?;
    let a = common::department(&ctx, &gm, "Alpha").await?;
    let b = common::department(&ctx, &gm, "Beta").await?;
    let emp = common::create_user(&ctx, "emp", Role::Employee).await?;

    let a = ctx.department_service.apply_member_plan(&gm, a.id, &[emp.id]).await?;
    assert_eq!(a.member_ids, vec![emp.id]);
    assert_eq!(ctx.user_service.get(emp.id).await?.department_id, Some(a.id));

    let b = ctx.department_service.apply_member_plan(&gm, b.id, &[emp.id]).await?;
    assert_eq!(b.member_ids, vec![emp.id]);

    let a = ctx.department_service.get(&gm, a.id).await?;
    assert!(a.member_ids.is_empty());
    assert_eq!(ctx.user_service.get(emp.id).await?.department_id, Some(b.id));

    // Removing the member clears the user's department too.
    ctx.department_service.apply_member_plan(&gm, b.id, &[]).await?;
    assert_eq!(ctx.user_service.get(emp.id).await?.department_id, None);
    Ok(())
}

#[tokio::test]
async fn test_ineligible_member_writes_nothing() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let (_, gm) = common::gm(&ctx).await?;
    let dept = common::department(&ctx, &gm, "Alpha").await?;
    let emp = common::create_user(&ctx, "emp", Role::Employee).await?;
    let boss = common::create_user(&ctx, "boss", Role::Manager).await?;

    let result = ctx
        .department_service
        .apply_member_plan(&gm, dept.id, &[emp.id, boss.id])
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let dept = ctx.department_service.get(&gm, dept.id).await?;
    assert!(dept.member_ids.is_empty());
    assert_eq!(ctx.user_service.get(emp.id).await?.department_id, None);

    // Employees cannot manage.
    let result = ctx
        .department_service
        .apply_manager_plan(&gm, dept.id, &[emp.id])
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(ctx.department_service.get(&gm, dept.id).await?.manager_ids.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_manager_plan_and_scope() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let (gm_user, gm) = common::gm(&ctx).await?;
    let mine = common::department(&ctx, &gm, "Mine").await?;
    let other = common::department(&ctx, &gm, "Other").await?;
    let boss = common::create_user(&ctx, "boss", Role::Manager).await?;
    let emp = common::create_user(&ctx, "emp", Role::Employee).await?;

    let mine = ctx
        .department_service
        .apply_manager_plan(&gm, mine.id, &[boss.id, gm_user.id])
        .await?;
    assert_eq!(mine.managers_count(), 2);

    let boss = common::actor(&ctx, &boss).await?;
    assert!(boss.manages(mine.id));

    let listed = ctx.department_service.list_for(&boss).await?;
    assert_eq!(listed.iter().map(|d| d.id).collect::<Vec<_>>(), vec![mine.id]);
    assert_eq!(ctx.department_service.list_for(&gm).await?.len(), 2);

    // A manager staffs their own department, nothing else.
    ctx.department_service.assign_member(&boss, emp.id, mine.id).await?;
    assert!(ctx.department_service.get(&boss, mine.id).await?.has_member(emp.id));

    let foreign = ctx.department_service.apply_member_plan(&boss, other.id, &[emp.id]).await;
    assert!(matches!(foreign, Err(AppError::Forbidden(_))));

    let managers = ctx.department_service.apply_manager_plan(&boss, mine.id, &[]).await;
    assert!(matches!(managers, Err(AppError::Forbidden(_))));

    let rename = ctx.department_service.rename(&boss, mine.id, "Renamed").await;
    assert!(matches!(rename, Err(AppError::Forbidden(_))));

    // Employees see no directory at all.
    let emp = common::actor(&ctx, &emp).await?;
    let directory = ctx.department_service.list_for(&emp).await;
    assert!(matches!(directory, Err(AppError::Forbidden(_))));
    Ok(())
}

#[tokio::test]
async fn test_department_names() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let (_, gm) = common::gm(&ctx).await?;
    let dept = common::department(&ctx, &gm, "  Finance ").await?;
    assert_eq!(dept.name, "Finance");

    let duplicate = common::department(&ctx, &gm, "Finance").await;
    assert!(duplicate.is_err());

    let blank = common::department(&ctx, &gm, "   ").await;
    assert!(blank.is_err());

    let renamed = ctx.department_service.rename(&gm, dept.id, "Finance & Legal").await?;
    assert_eq!(renamed.name, "Finance & Legal");

    // Renaming to its own name is fine.
    ctx.department_service.rename(&gm, dept.id, "Finance & Legal").await?;
    Ok(())
}
