//! Projects the registry starts with when the store is empty.
use super::models::{Difficulty, Project};

#[allow(clippy::too_many_arguments)]
fn project(
    id: &str,
    title: &str,
    description: &str,
    language: &str,
    difficulty: Difficulty,
    tags: &[&str],
    file_structure: &str,
    zip_file_name: &str,
) -> Project {
    Project {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        language: language.to_string(),
        difficulty,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        file_structure: file_structure.to_string(),
        zip_file_name: zip_file_name.to_string(),
    }
}

/// The default project set in display order.
pub fn initial_projects() -> Vec<Project> {
    vec![
        project(
            "p1",
            "Todo List CLI",
            "A command line todo manager that stores tasks in a JSON file. Covers argument parsing, file I/O and basic data modelling.",
            "Python",
            Difficulty::Beginner,
            &["cli", "json", "files"],
            "todo-cli/\n  main.py\n  storage.py\n  tasks.json\n  README.md",
            "todo-cli.zip",
        ),
        project(
            "p2",
            "Weather Dashboard",
            "A React dashboard that fetches forecasts from a public weather API and renders them as cards and charts.",
            "TypeScript",
            Difficulty::Intermediate,
            &["react", "api", "charts"],
            "weather-dashboard/\n  src/\n    App.tsx\n    api/weather.ts\n    components/ForecastCard.tsx\n  package.json",
            "weather-dashboard.zip",
        ),
        project(
            "p3",
            "Key-Value Store",
            "An in-memory key-value store with a write-ahead log and snapshotting, served over a tiny TCP protocol.",
            "Rust",
            Difficulty::Advanced,
            &["storage", "networking", "concurrency"],
            "kv-store/\n  src/\n    main.rs\n    log.rs\n    server.rs\n  Cargo.toml",
            "kv-store.zip",
        ),
        project(
            "p4",
            "URL Shortener",
            "A small HTTP service that shortens links and counts redirects, backed by SQLite.",
            "Go",
            Difficulty::Intermediate,
            &["http", "sqlite"],
            "url-shortener/\n  main.go\n  handlers.go\n  store.go\n  go.mod",
            "url-shortener.zip",
        ),
    ]
}
