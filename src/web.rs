//! The single planner page.
//!
//! Every load runs the mode-dependent refresh and fires due alarms, then
//! applies the request's query parameters and renders the current state.

use crate::{
    config::ServerConfig,
    entry::{Notification, PendingAlarm},
    process::SharedPlanner,
};
use axum::Router;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use chrono::Local;
use serde::Deserialize;
use std::fmt::Write;

const PAGE_TITLE: &str = "Covid Planner";

#[derive(Debug, Default, Deserialize)]
pub struct IndexQuery {
    /// Alarm time, `YYYY-MM-DDTHH:MM`.
    pub alarm: Option<String>,
    /// Alarm title.
    pub two: Option<String>,
    pub weather: Option<String>,
    pub news: Option<String>,
    /// Title of the alarm to cancel.
    pub alarm_item: Option<String>,
    /// Title of the notification to dismiss.
    pub notif: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

pub fn router(planner: SharedPlanner) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/index", get(index))
        .with_state(planner)
}

pub async fn serve(config: &ServerConfig, planner: SharedPlanner) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!("planner listening on http://{local_addr}/index");
    axum::serve(listener, router(planner)).await?;
    Ok(())
}

async fn index(
    State(planner): State<SharedPlanner>,
    Query(query): Query<IndexQuery>,
) -> Html<String> {
    let mut planner = planner.lock().await;
    let now = Local::now();

    planner.on_page_load(now).await;

    // Rejected requests are logged by the planner; the page just shows
    // the unchanged state.
    if let Some(alarm_time) = present(&query.alarm) {
        match present(&query.two) {
            Some(title) => {
                let _ = planner.schedule(
                    title,
                    alarm_time,
                    present(&query.weather).is_some(),
                    present(&query.news).is_some(),
                    now,
                );
            }
            None => tracing::error!("cannot schedule alarm for {alarm_time}: missing title"),
        }
    }
    if let Some(title) = present(&query.alarm_item) {
        let _ = planner.cancel(title);
    }
    if let Some(title) = present(&query.notif) {
        let _ = planner.dismiss(title);
    }

    Html(render_page(&planner.list_pending(), &planner.list_active()))
}

/// Renders the page. Notification content is inserted as-is since it is
/// sanitized when the notification is built; everything else is escaped.
pub fn render_page(alarms: &[PendingAlarm], notifications: &[Notification]) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html>\n\
         <head><meta charset=\"utf-8\"><title>{PAGE_TITLE}</title></head>\n\
         <body>\n<h1>{PAGE_TITLE}</h1>\n"
    );

    html.push_str(
        "<form action=\"/index\" method=\"get\">\n\
         <input type=\"datetime-local\" name=\"alarm\" required>\n\
         <input type=\"text\" name=\"two\" placeholder=\"Alarm title\" required>\n\
         <label><input type=\"checkbox\" name=\"weather\" value=\"true\"> Weather</label>\n\
         <label><input type=\"checkbox\" name=\"news\" value=\"true\"> News</label>\n\
         <input type=\"submit\" value=\"Set alarm\">\n\
         </form>\n",
    );

    html.push_str("<h2>Alarms</h2>\n<ul class=\"alarms\">\n");
    for alarm in alarms {
        let _ = writeln!(
            html,
            "<li><strong>{}</strong> {} <a href=\"/index?alarm_item={}\">Cancel</a></li>",
            html_escape::encode_text(&alarm.title),
            html_escape::encode_text(&alarm.content),
            urlencoding::encode(&alarm.title)
        );
    }
    html.push_str("</ul>\n");

    html.push_str("<h2>Notifications</h2>\n<ul class=\"notifications\">\n");
    for notif in notifications {
        let _ = writeln!(
            html,
            "<li><strong>{}</strong> {} <a href=\"/index?notif={}\">Dismiss</a></li>",
            html_escape::encode_text(&notif.title),
            notif.content,
            urlencoding::encode(&notif.title)
        );
    }
    html.push_str("</ul>\n</body>\n</html>\n");
    html
}
