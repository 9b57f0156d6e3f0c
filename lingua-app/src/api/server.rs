use axum::{
    routing::{get, post, put},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::api::routes::{
    create_flashcard, delete_flashcard, due_flashcards, list_flashcards, list_progress,
    progress_by_language, record_activity, review_flashcard, statistics, streak, AppState,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/flashcards", get(list_flashcards).post(create_flashcard))
        .route("/flashcards/due", get(due_flashcards))
        .route("/flashcards/:id/review", put(review_flashcard))
        .route("/flashcards/:id", axum::routing::delete(delete_flashcard))
        .route("/progress", get(list_progress))
        .route("/progress/streak", get(streak))
        .route("/progress/statistics", get(statistics))
        .route("/progress/activity", post(record_activity))
        .route("/progress/:language", get(progress_by_language))
        .with_state(Arc::new(state))
        .layer(TraceLayer::new_for_http())
}

pub async fn run(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = router(state);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "api listening");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
