use blogicum::config::Config;
use blogicum::models::db_operations::users_db_operations;
use blogicum::setup::db_setup;
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "setup_cli", author, version, about = "A CLI for initial Blogicum setup.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand, Debug)]
enum DbAction {
    /// Creates the database file and its tables. Safe to run again.
    Setup,
}

#[derive(Subcommand, Debug)]
enum AdminAction {
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    List,
    ChangePassword {
        #[arg(long)]
        username: String,
        #[arg(long)]
        new_password: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file)
        .expect("FATAL: Failed to load or parse configuration.");

    match &cli.command {
        Commands::Db { action } => match action {
            DbAction::Setup => setup_blog_database(&config),
        },
        Commands::Admin { action } => match action {
            AdminAction::Create { username, password } => create_admin_user(&config, username, password),
            AdminAction::List => list_admin_users(&config),
            AdminAction::ChangePassword { username, new_password } => {
                change_admin_password(&config, username, new_password)
            }
        },
    }
}

fn open_existing_db(config: &Config) -> Option<Connection> {
    let db_path = config.blog_db_path();
    if !db_path.exists() {
        eprintln!("❌ Error: Blog database not found at '{}'. Please run `setup_cli db setup` first.", db_path.display());
        return None;
    }
    match Connection::open(&db_path) {
        Ok(conn) => match conn.execute_batch("PRAGMA foreign_keys = ON;") {
            Ok(_) => Some(conn),
            Err(e) => {
                eprintln!("❌ Error configuring database connection: {}", e);
                None
            }
        },
        Err(e) => {
            eprintln!("❌ Error opening blog database: {}", e);
            None
        }
    }
}

fn setup_blog_database(config: &Config) {
    let db_path = config.blog_db_path();
    println!("\nSetting up blog database at '{}'...", db_path.display());

    if let Some(parent_dir) = db_path.parent() {
        fs::create_dir_all(parent_dir).expect("Could not create database directory.");
    }
    fs::create_dir_all(config.post_images_dir()).expect("Could not create media directory.");

    let mut conn = Connection::open(&db_path).expect("Could not create blog database file.");
    match db_setup::setup_blog_db(&mut conn) {
        Ok(_) => println!("✅ Blog database setup completed successfully."),
        Err(e) => eprintln!("❌ Error setting up blog database: {}", e),
    }
}

fn create_admin_user(config: &Config, username: &str, password: &str) {
    let Some(conn) = open_existing_db(config) else { return };

    match users_db_operations::create_user(&conn, username, "", password, true) {
        Ok(_) => println!("✅ Admin user '{}' created successfully.", username),
        Err(e) => eprintln!("❌ Error creating admin user: {}. It might be because the username already exists.", e),
    }
}

fn list_admin_users(config: &Config) {
    let Some(conn) = open_existing_db(config) else { return };

    println!("Listing Admin Users:");
    match users_db_operations::read_staff_users(&conn) {
        Ok(users) => {
            for user in users {
                let state = if user.is_active { "" } else { " (inactive)" };
                println!("- {}{}", user.username, state);
            }
        }
        Err(e) => eprintln!("❌ Error fetching admins: {}", e),
    }
}

fn change_admin_password(config: &Config, username: &str, new_password: &str) {
    let Some(conn) = open_existing_db(config) else { return };

    match users_db_operations::read_user_by_username(&conn, username) {
        Ok(Some(user)) if user.is_staff => {}
        Ok(_) => {
            eprintln!("❌ Error: No admin user named '{}' found.", username);
            return;
        }
        Err(e) => {
            eprintln!("❌ Error looking up user: {}", e);
            return;
        }
    }

    match users_db_operations::change_password(&conn, username, new_password) {
        Ok(0) => eprintln!("❌ Error: No admin user named '{}' found.", username),
        Ok(_) => println!("✅ Password for admin user '{}' changed successfully.", username),
        Err(e) => eprintln!("❌ Error updating password: {}", e),
    }
}
