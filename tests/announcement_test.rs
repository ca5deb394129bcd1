mod common;

use chrono::{Duration, Utc};
use intranet::{
    auth::Actor,
    domain::{Announcement, AnnouncementDraft, AnnouncementStatus, Role},
    error::AppError,
    service::ServiceContext,
};
use uuid::Uuid;

fn draft(title: &str, department_ids: Vec<Uuid>) -> AnnouncementDraft {
    AnnouncementDraft {
        title: title.to_string(),
        content: format!("{} body", title),
        department_ids,
        ..Default::default()
    }
}

async fn published(ctx: &ServiceContext, actor: &Actor, d: AnnouncementDraft) -> anyhow::Result<Announcement> {
    let created = ctx.announcement_service.create(actor, d).await?;
    Ok(ctx
        .announcement_service
        .publish(actor, &created.slug, Utc::now())
        .await?)
}

fn slugs(list: &[Announcement]) -> Vec<&str> {
    list.iter().map(|a| a.slug.as_str()).collect()
}

#[tokio::test]
async fn test_slugs_get_numbered_suffixes() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let (_, gm) = common::gm(&ctx).await?;

    let first = ctx.announcement_service.create(&gm, draft("Team Update", vec![])).await?;
    let second = ctx.announcement_service.create(&gm, draft("Team Update", vec![])).await?;
    let third = ctx.announcement_service.create(&gm, draft("team   update!", vec![])).await?;

    assert_eq!(first.slug, "team-update");
    assert_eq!(second.slug, "team-update-2");
    assert_eq!(third.slug, "team-update-3");
    assert_eq!(first.status, AnnouncementStatus::Draft);
    assert_eq!(first.author_id, Some(gm.user_id));

    // Archived announcements still hold their slug.
    ctx.announcement_service.archive(&gm, &first.slug).await?;
    let fourth = ctx.announcement_service.create(&gm, draft("Team Update", vec![])).await?;
    assert_eq!(fourth.slug, "team-update-4");

    let symbols = ctx.announcement_service.create(&gm, draft("!!!", vec![])).await?;
    let more = ctx.announcement_service.create(&gm, draft("???", vec![])).await?;
    assert_eq!(symbols.slug, "announcement");
    assert_eq!(more.slug, "announcement-2");

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_get_distinct_slugs() -> anyhow::Result<()> {
    let db = common::setup_shared(8).await?;
    let (_, gm) = common::gm(&db.ctx).await?;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let ctx = db.ctx.clone();
        let gm = gm.clone();
        handles.push(tokio::spawn(async move {
            ctx.announcement_service.create(&gm, draft("Team Update", vec![])).await
        }));
    }

    let mut created = Vec::new();
    for handle in handles {
        created.push(handle.await??.slug);
    }
    created.sort();

    let mut expected = vec!["team-update".to_string()];
    expected.extend((2..=8).map(|n| format!("team-update-{}", n)));
    expected.sort();
    assert_eq!(created, expected);
    Ok(())
}

#[tokio::test]
async fn test_edit_keeps_slug_and_status() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let (_, gm) = common::gm(&ctx).await?;

    let original = published(&ctx, &gm, draft("Quarterly Results", vec![])).await?;
    let edited = ctx
        .announcement_service
        .update(&gm, &original.slug, draft("Quarterly Results (corrected)", vec![]))
        .await?;

    assert_eq!(edited.slug, "quarterly-results");
    assert_eq!(edited.title, "Quarterly Results (corrected)");
    assert_eq!(edited.status, AnnouncementStatus::Published);
    assert_eq!(edited.publish_at, original.publish_at);
    Ok(())
}

#[tokio::test]
async fn test_published_edit_keeps_author_publish_rules() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let (_, gm) = common::gm(&ctx).await?;
    let sales = common::department(&ctx, &gm, "Sales").await?;
    let ops = common::department(&ctx, &gm, "Operations").await?;

    let lead = common::create_user(&ctx, "sales-lead", Role::Manager).await?;
    ctx.department_service.apply_manager_plan(&gm, sales.id, &[lead.id]).await?;
    let lead = common::actor(&ctx, &lead).await?;
    let outsider = common::create_user(&ctx, "outsider", Role::Employee).await?;
    ctx.department_service.apply_member_plan(&gm, ops.id, &[outsider.id]).await?;
    let outsider = common::actor(&ctx, &outsider).await?;

    let news = published(&ctx, &lead, draft("Sales News", vec![sales.id])).await?;

    let to_everyone = ctx
        .announcement_service
        .update(&lead, &news.slug, draft("Sales News", vec![]))
        .await;
    assert!(matches!(to_everyone, Err(AppError::Validation(_))));

    // The author's rules hold even when a GM does the editing.
    let by_gm = ctx
        .announcement_service
        .update(&gm, &news.slug, draft("Sales News", vec![sales.id, ops.id]))
        .await;
    assert!(matches!(by_gm, Err(AppError::Validation(_))));

    let stored = ctx.announcement_service.get(&news.slug).await?;
    assert_eq!(stored.department_ids, vec![sales.id]);
    assert!(ctx.announcement_service.visible_for(&outsider).await?.is_empty());

    // Drafts are only checked when they are published.
    let draft_only = ctx.announcement_service.create(&lead, draft("Sales Plans", vec![sales.id])).await?;
    let edited = ctx
        .announcement_service
        .update(&lead, &draft_only.slug, draft("Sales Plans", vec![]))
        .await?;
    assert!(edited.department_ids.is_empty());
    assert_eq!(edited.status, AnnouncementStatus::Draft);
    Ok(())
}

#[tokio::test]
async fn test_only_author_or_gm_edits() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let (_, gm) = common::gm(&ctx).await?;
    let eve = common::create_user(&ctx, "eve", Role::Employee).await?;
    let eve = common::actor(&ctx, &eve).await?;
    let max = common::create_user(&ctx, "max", Role::Employee).await?;
    let max = common::actor(&ctx, &max).await?;

    let mine = ctx.announcement_service.create(&eve, draft("Lunch Menu", vec![])).await?;

    let denied = ctx
        .announcement_service
        .update(&max, &mine.slug, draft("Hijacked", vec![]))
        .await;
    assert!(matches!(denied, Err(AppError::Forbidden(_))));

    ctx.announcement_service
        .update(&gm, &mine.slug, draft("Lunch Menu v2", vec![]))
        .await?;
    let edited = ctx.announcement_service.update(&eve, &mine.slug, draft("Lunch Menu v3", vec![])).await?;
    assert_eq!(edited.title, "Lunch Menu v3");
    Ok(())
}

#[tokio::test]
async fn test_validation_errors() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let (_, gm) = common::gm(&ctx).await?;

    let blank = ctx.announcement_service.create(&gm, draft("   ", vec![])).await;
    assert!(matches!(blank, Err(AppError::Validation(_))));

    let now = Utc::now();
    let backwards = AnnouncementDraft {
        publish_at: Some(now),
        expire_at: Some(now - Duration::hours(1)),
        ..draft("Backwards", vec![])
    };
    let result = ctx.announcement_service.create(&gm, backwards).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    Ok(())
}

#[tokio::test]
async fn test_mark_read_is_idempotent() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let (_, gm) = common::gm(&ctx).await?;
    let reader = common::create_user(&ctx, "reader", Role::Employee).await?;
    let reader = common::actor(&ctx, &reader).await?;

    let a = published(&ctx, &gm, draft("Office Closed Friday", vec![])).await?;

    let first = ctx.announcement_service.mark_read(&reader, &a.slug).await?;
    let second = ctx.announcement_service.mark_read(&reader, &a.slug).await?;
    assert_eq!(first.read_at, second.read_at);

    assert!(ctx.announcement_service.is_read_by(a.id, reader.user_id).await?);
    assert_eq!(ctx.announcement_service.read_count(&gm, &a).await?, 1);
    assert!(ctx.announcement_service.read_ids_for(reader.user_id).await?.contains(&a.id));

    // Read statistics are for the author and GMs.
    let denied = ctx.announcement_service.read_count(&reader, &a).await;
    assert!(matches!(denied, Err(AppError::Forbidden(_))));
    Ok(())
}

#[tokio::test]
async fn test_visibility_follows_departments() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let (_, gm) = common::gm(&ctx).await?;
    let x = common::department(&ctx, &gm, "X").await?;
    let y = common::department(&ctx, &gm, "Y").await?;

    let in_x = common::create_user(&ctx, "in-x", Role::Employee).await?;
    let in_y = common::create_user(&ctx, "in-y", Role::Employee).await?;
    let loner = common::create_user(&ctx, "loner", Role::Employee).await?;
    let boss = common::create_user(&ctx, "boss", Role::Manager).await?;

    ctx.department_service.apply_member_plan(&gm, x.id, &[in_x.id]).await?;
    ctx.department_service.apply_member_plan(&gm, y.id, &[in_y.id]).await?;
    ctx.department_service.apply_manager_plan(&gm, x.id, &[boss.id]).await?;

    let targeted = published(&ctx, &gm, draft("X Only", vec![x.id])).await?;
    let global = published(&ctx, &gm, draft("Everyone", vec![])).await?;

    let sees = |list: Vec<Announcement>, a: &Announcement| list.iter().any(|b| b.id == a.id);

    let in_x = common::actor(&ctx, &in_x).await?;
    let in_y = common::actor(&ctx, &in_y).await?;
    let loner = common::actor(&ctx, &loner).await?;
    let boss = common::actor(&ctx, &boss).await?;

    let svc = &ctx.announcement_service;
    assert!(sees(svc.visible_for(&in_x).await?, &targeted));
    assert!(sees(svc.visible_for(&boss).await?, &targeted));
    assert!(sees(svc.visible_for(&gm).await?, &targeted));
    assert!(!sees(svc.visible_for(&in_y).await?, &targeted));
    assert!(!sees(svc.visible_for(&loner).await?, &targeted));

    for actor in [&in_x, &in_y, &loner, &boss, &gm] {
        assert!(sees(svc.visible_for(actor).await?, &global));
    }

    // Reading follows the same rule.
    let hidden = svc.find_for_viewer(&in_y, &targeted.slug).await;
    assert!(matches!(hidden, Err(AppError::NotFound(_))));
    let hidden_read = svc.mark_read(&in_y, &targeted.slug).await;
    assert!(matches!(hidden_read, Err(AppError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn test_schedule_window_and_drafts_hidden() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let (_, gm) = common::gm(&ctx).await?;
    let viewer = common::create_user(&ctx, "viewer", Role::Employee).await?;
    let viewer = common::actor(&ctx, &viewer).await?;
    let now = Utc::now();

    let future = published(
        &ctx,
        &gm,
        AnnouncementDraft { publish_at: Some(now + Duration::days(1)), ..draft("Tomorrow", vec![]) },
    )
    .await?;
    let expired = published(
        &ctx,
        &gm,
        AnnouncementDraft {
            publish_at: Some(now - Duration::hours(2)),
            expire_at: Some(now - Duration::hours(1)),
            ..draft("Yesterday", vec![])
        },
    )
    .await?;
    let live = published(
        &ctx,
        &gm,
        AnnouncementDraft { expire_at: Some(now + Duration::hours(1)), ..draft("Now", vec![]) },
    )
    .await?;
    let pinned = published(&ctx, &gm, AnnouncementDraft { pinned: true, ..draft("Pinned", vec![]) }).await?;
    ctx.announcement_service.create(&gm, draft("Unpublished", vec![])).await?;

    assert!(future.publish_at > Some(now));

    let visible = ctx.announcement_service.visible_for(&viewer).await?;
    assert_eq!(slugs(&visible), vec![pinned.slug.as_str(), live.slug.as_str()]);
    assert!(!slugs(&visible).contains(&expired.slug.as_str()));

    ctx.announcement_service.archive(&gm, &live.slug).await?;
    let visible = ctx.announcement_service.visible_for(&viewer).await?;
    assert_eq!(slugs(&visible), vec![pinned.slug.as_str()]);
    Ok(())
}

#[tokio::test]
async fn test_publish_rules() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let (_, gm) = common::gm(&ctx).await?;
    let sales = common::department(&ctx, &gm, "Sales").await?;
    let ops = common::department(&ctx, &gm, "Ops").await?;

    let manager = common::create_user(&ctx, "manager", Role::Manager).await?;
    ctx.department_service.apply_manager_plan(&gm, sales.id, &[manager.id]).await?;
    let manager = common::actor(&ctx, &manager).await?;
    let employee = common::create_user(&ctx, "employee", Role::Employee).await?;
    let employee = common::actor(&ctx, &employee).await?;

    // Employees may write drafts but not publish them.
    let note = ctx.announcement_service.create(&employee, draft("Bake Sale", vec![])).await?;
    let denied = ctx.announcement_service.publish(&employee, &note.slug, Utc::now()).await;
    assert!(matches!(denied, Err(AppError::Forbidden(_))));

    // A GM publishing it still runs into the author's rules.
    let by_gm = ctx.announcement_service.publish(&gm, &note.slug, Utc::now()).await;
    match by_gm {
        Err(AppError::Validation(message)) => assert_eq!(message, "Employees cannot publish announcements."),
        other => panic!("expected validation error, got {:?}", other),
    }

    // Managers must target, and only their own departments.
    let global = ctx.announcement_service.create(&manager, draft("All Hands", vec![])).await?;
    let untargeted = ctx.announcement_service.publish(&manager, &global.slug, Utc::now()).await;
    assert!(matches!(untargeted, Err(AppError::Validation(_))));

    let foreign = ctx.announcement_service.create(&manager, draft("Ops News", vec![ops.id])).await;
    match foreign {
        Err(AppError::Validation(message)) => assert_eq!(message, "You can only target departments you manage."),
        other => panic!("expected validation error, got {:?}", other),
    }

    let ok = ctx.announcement_service.create(&manager, draft("Sales News", vec![sales.id])).await?;
    let when = Utc::now();
    let live = ctx.announcement_service.publish(&manager, &ok.slug, when).await?;
    assert_eq!(live.status, AnnouncementStatus::Published);
    assert_eq!(live.publish_at, Some(when));

    // Archived is terminal.
    ctx.announcement_service.archive(&manager, &ok.slug).await?;
    let again = ctx.announcement_service.publish(&gm, &ok.slug, Utc::now()).await;
    assert!(matches!(again, Err(AppError::Validation(_))));
    Ok(())
}

#[tokio::test]
async fn test_bulk_publish_skips_failures() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let (_, gm) = common::gm(&ctx).await?;
    let employee = common::create_user(&ctx, "employee", Role::Employee).await?;
    let employee = common::actor(&ctx, &employee).await?;

    let good = ctx.announcement_service.create(&gm, draft("Holiday Schedule", vec![])).await?;
    let bad = ctx.announcement_service.create(&employee, draft("My Draft", vec![])).await?;

    let outcome = ctx
        .announcement_service
        .bulk_publish(
            &gm,
            &[good.slug.clone(), bad.slug.clone(), "no-such-slug".to_string()],
            Utc::now(),
        )
        .await;

    assert_eq!(outcome.succeeded, vec![good.slug.clone()]);
    assert_eq!(outcome.skipped.len(), 2);
    assert_eq!(outcome.summary("Published"), "Published 1 announcement(s), skipped 2.");

    assert_eq!(
        ctx.announcement_service.get(&good.slug).await?.status,
        AnnouncementStatus::Published
    );
    assert_eq!(
        ctx.announcement_service.get(&bad.slug).await?.status,
        AnnouncementStatus::Draft
    );

    let archived = ctx
        .announcement_service
        .bulk_archive(&gm, &[good.slug.clone(), bad.slug.clone()])
        .await;
    assert_eq!(archived.succeeded.len(), 2);
    assert!(archived.skipped.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_manageable_lists() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let (_, gm) = common::gm(&ctx).await?;
    let author = common::create_user(&ctx, "author", Role::Employee).await?;
    let author = common::actor(&ctx, &author).await?;

    ctx.announcement_service.create(&author, draft("Mine", vec![])).await?;
    ctx.announcement_service.create(&gm, draft("Theirs", vec![])).await?;

    assert_eq!(ctx.announcement_service.manageable_by(&author).await?.len(), 1);
    assert_eq!(ctx.announcement_service.manageable_by(&gm).await?.len(), 2);
    Ok(())
}
