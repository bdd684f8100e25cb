use anyhow::{Result, bail};
use clap::Subcommand;

use crate::auth::check_session;
use crate::core::AppConfig;
use crate::core::db::async_db;
use crate::projects::{
    Difficulty, NewProject, Project, ProjectRepository, SqliteProjectRepository, deploy_status,
    parse_tags,
};
use crate::session::SqliteSessionRepository;

#[derive(Subcommand)]
pub enum ProjectsCommand {
    /// List every project, newest first
    List {},
    /// Add a project to the registry (admin only)
    Add {
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        language: String,
        #[arg(long, default_value = "Beginner")]
        difficulty: Difficulty,
        /// Comma separated, e.g. "CLI, Basics"
        #[arg(long, default_value = "")]
        tags: String,
        #[arg(long, default_value = "src/\n  index.js")]
        file_structure: String,
        #[arg(long, default_value = "")]
        zip_file_name: String,
    },
}

fn print_project(project: &Project) {
    println!(
        "{:<40} {:<20} {:<12} {:<12} [{}]",
        project.id,
        project.title,
        project.language,
        project.difficulty,
        project.tags.join(", ")
    );
}

pub async fn run(config: &AppConfig, command: ProjectsCommand) -> Result<()> {
    let db = async_db(&config.db_path).await?;
    let registry = SqliteProjectRepository::new(&db);

    match command {
        ProjectsCommand::List {} => {
            for project in registry.list().await? {
                print_project(&project);
            }
        }
        ProjectsCommand::Add {
            title,
            description,
            language,
            difficulty,
            tags,
            file_structure,
            zip_file_name,
        } => {
            let sessions = SqliteSessionRepository::new(&db);
            match check_session(&sessions).await {
                Some(user) if user.is_admin() => {}
                Some(user) => bail!("{} is not an administrator", user.username),
                None => bail!("Not logged in. Run `codevault login` as an administrator"),
            }

            let submission = NewProject {
                title,
                description,
                language,
                difficulty,
                tags: parse_tags(&tags),
                file_structure,
                zip_file_name,
            };
            // The status line is the only feedback for a rejected form
            let submission = match submission.validate() {
                Ok(s) => s,
                Err(e) => {
                    println!("{}", e);
                    return Ok(());
                }
            };
            let project = registry.add(submission).await?;
            print_project(&project);
            println!(
                "{}",
                deploy_status(&project.zip_file_name, &config.downloads_path)
            );
        }
    }

    Ok(())
}
