use anyhow::Context;
use chrono::{Duration, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use fake::{
    faker::name::en::{FirstName, LastName},
    Fake,
};
use sqlx::sqlite::SqlitePoolOptions;

use intranet::{
    config::Settings,
    domain::{AnnouncementDraft, CreateDepartmentRequest, CreateRoomRequest, CreateUserRequest, Role, RoomCategory, RoomSize, User},
    service::{BookingRequest, ServiceContext},
};

#[derive(Parser)]
#[command(name = "seed", about = "Create users and demo data for the intranet")]
struct Cli {
    /// Database URL; defaults to the configured one.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fill an empty database with departments, rooms, users and announcements.
    Demo {
        /// Employees to generate per department.
        #[arg(long, default_value_t = 4)]
        employees: usize,
    },
    /// Create a single user.
    CreateUser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        full_name: String,
        #[arg(long)]
        password: String,
        /// employee, manager or gm
        #[arg(long, default_value = "employee")]
        role: String,
    },
}

const DEMO_PASSWORD: &str = "password123";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = Settings::new().context("Failed to load config")?;
    let database_url = cli
        .database_url
        .unwrap_or_else(|| settings.database.url.clone());

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let ctx = ServiceContext::new(db_pool, &settings)?;

    match cli.command {
        Command::CreateUser { username, email, full_name, password, role } => {
            let role = Role::parse(&role)
                .ok_or_else(|| anyhow::anyhow!("Unknown role {:?}; use employee, manager or gm", role))?;
            let user = ctx
                .user_service
                .create_user(CreateUserRequest { username, email, full_name, password, role })
                .await?;
            println!("  ✅ Created {} ({})", user.username, user.role.label());
        }
        Command::Demo { employees } => seed_demo(&ctx, employees).await?,
    }

    Ok(())
}

fn hour(h: u32) -> anyhow::Result<NaiveTime> {
    NaiveTime::from_hms_opt(h, 0, 0).ok_or_else(|| anyhow::anyhow!("invalid hour {}", h))
}

async fn create_user(ctx: &ServiceContext, username: &str, full_name: &str, role: Role) -> anyhow::Result<User> {
    Ok(ctx
        .user_service
        .create_user(CreateUserRequest {
            username: username.to_string(),
            email: format!("{}@intranet.local", username),
            full_name: full_name.to_string(),
            password: DEMO_PASSWORD.to_string(),
            role,
        })
        .await?)
}

async fn seed_demo(ctx: &ServiceContext, employees_per_department: usize) -> anyhow::Result<()> {
    println!("🌱 Seeding demo data...");

    if !ctx.user_service.list().await?.is_empty() {
        anyhow::bail!("The database already has users; demo data only goes into an empty database.");
    }

    println!("👥 Creating users...");
    let gm_user = create_user(ctx, "gm", "Grace Director", Role::GeneralManager).await?;
    let gm = ctx.user_service.actor_for(&gm_user).await?;

    let mut departments = Vec::new();
    for name in ["Engineering", "Sales", "Operations"] {
        let department = ctx
            .department_service
            .create(&gm, CreateDepartmentRequest { name: name.to_string() })
            .await?;

        let manager_username = format!("{}-lead", name.to_lowercase());
        let manager_name = format!("{} {}", FirstName().fake::<String>(), LastName().fake::<String>());
        let manager = create_user(ctx, &manager_username, &manager_name, Role::Manager).await?;
        ctx.department_service
            .apply_manager_plan(&gm, department.id, &[manager.id])
            .await?;

        let mut member_ids = Vec::new();
        for i in 1..=employees_per_department {
            let full_name = format!("{} {}", FirstName().fake::<String>(), LastName().fake::<String>());
            let username = format!("{}{}", name.to_lowercase(), i);
            member_ids.push(create_user(ctx, &username, &full_name, Role::Employee).await?.id);
        }
        ctx.department_service
            .apply_member_plan(&gm, department.id, &member_ids)
            .await?;

        println!("  ✅ {}: 1 manager, {} employees", name, member_ids.len());
        departments.push((department, manager));
    }

    println!("🏢 Creating rooms...");
    let rooms = [
        ("Huddle 1", RoomSize::Small, RoomCategory::Huddle, 4, "2nd floor"),
        ("Boardroom", RoomSize::Large, RoomCategory::Board, 16, "5th floor"),
        ("Training Lab", RoomSize::Large, RoomCategory::Training, 24, "Ground floor"),
        ("Sales Meeting Room", RoomSize::Medium, RoomCategory::Meeting, 8, "3rd floor"),
    ];
    let mut first_room = None;
    for (name, size, category, capacity, location) in rooms {
        let room = ctx
            .room_service
            .create_room(
                &gm,
                CreateRoomRequest {
                    name: name.to_string(),
                    size,
                    category,
                    capacity,
                    location: location.to_string(),
                },
            )
            .await?;
        first_room.get_or_insert(room);
    }
    println!("  ✅ Created {} rooms", rooms.len());

    println!("📢 Creating announcements...");
    let welcome = ctx
        .announcement_service
        .create(
            &gm,
            AnnouncementDraft {
                title: "Welcome to the intranet".to_string(),
                content: "Book rooms, read company news and keep your department up to date.".to_string(),
                pinned: true,
                ..Default::default()
            },
        )
        .await?;
    ctx.announcement_service
        .publish(&gm, &welcome.slug, Utc::now())
        .await?;

    for (department, manager) in &departments {
        let actor = ctx.user_service.actor_for(manager).await?;
        let update = ctx
            .announcement_service
            .create(
                &actor,
                AnnouncementDraft {
                    title: format!("{} weekly update", department.name),
                    content: format!("What {} is working on this week.", department.name),
                    department_ids: vec![department.id],
                    ..Default::default()
                },
            )
            .await?;
        ctx.announcement_service
            .publish(&actor, &update.slug, Utc::now())
            .await?;
    }
    println!("  ✅ Created {} announcements", departments.len() + 1);

    if let Some(room) = first_room {
        println!("📅 Creating a booking...");
        let tomorrow = Utc::now().with_timezone(ctx.booking_service.offset()).date_naive() + Duration::days(1);
        ctx.booking_service
            .create_booking(
                &gm,
                room.id,
                BookingRequest {
                    title: "Leadership sync".to_string(),
                    date: tomorrow,
                    start_time: hour(9)?,
                    end_time: hour(10)?,
                },
            )
            .await?;
        println!("  ✅ Booked {} tomorrow 09:00 to 10:00", room.name);
    }

    println!("\n✨ Database seeding complete!");
    println!("\n📝 Test credentials (password for everyone: {}):", DEMO_PASSWORD);
    println!("  General manager: gm");
    for (department, manager) in &departments {
        println!("  {} manager: {}", department.name, manager.username);
    }

    Ok(())
}
