//! Drives a tutor conversation for a project read from the registry

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use codevault::ai::chat::{
        ChatBuilder, ChatMessage, ChatState, LOST_CONNECTION_MESSAGE, TurnOutcome,
    };
    use codevault::ai::gateway::ProjectContext;
    use codevault::ai::scripted::{ScriptedGateway, ScriptedReply};
    use codevault::core::db::async_db;
    use codevault::projects::{ProjectRepository, SqliteProjectRepository};

    #[tokio::test]
    async fn it_chats_about_a_registry_project() {
        let dir = tempfile::tempdir().unwrap();
        let db = async_db(dir.path().to_str().unwrap()).await.unwrap();
        let project = SqliteProjectRepository::new(&db)
            .find("p3")
            .await
            .unwrap()
            .unwrap();

        let gateway = ScriptedGateway::new()
            .greeting("Welcome to the Key-Value Store.")
            .reply(ScriptedReply::fragments(&["Start in ", "src/main.rs"]))
            .reply(ScriptedReply::fail_after(&["The log"], "connection reset"));
        let mut chat = ChatBuilder::new(Arc::new(gateway.clone()), ProjectContext::from(&project))
            .analysis_step_delay(Duration::ZERO)
            .build();

        assert_eq!(chat.activate().await, ChatState::Ready);
        assert_eq!(gateway.contexts()[0].title, "Key-Value Store");

        assert_eq!(
            chat.send_message("Where do I start?").await,
            TurnOutcome::Completed
        );
        assert_eq!(
            chat.send_message("How does the log work?").await,
            TurnOutcome::Errored
        );
        assert_eq!(chat.state(), ChatState::Ready);

        assert_eq!(
            chat.transcript().messages(),
            &[
                ChatMessage::model("Welcome to the Key-Value Store."),
                ChatMessage::user("Where do I start?"),
                ChatMessage::model("Start in src/main.rs"),
                ChatMessage::user("How does the log work?"),
                ChatMessage::model("The log"),
                ChatMessage::model(LOST_CONNECTION_MESSAGE),
            ]
        );
    }
}
