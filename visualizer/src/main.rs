use chrono::{FixedOffset, Local};
use feedcore::projector::{ViewerState, VIEW_LIMIT};
use iced::{
    futures::{channel::mpsc, SinkExt, Stream, StreamExt},
    stream,
    widget::{button, column, pick_list, row, scrollable, text, text_input, Column, Container},
    Alignment, Element, Length, Subscription, Task, Theme,
};
use std::{fmt, time::Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

const DEFAULT_FEED_URL: &str = "ws://127.0.0.1:5000/ws";
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

fn main() -> iced::Result {
    iced::application(Visualizer::boot, Visualizer::update, Visualizer::view)
        .title(application_title)
        .subscription(application_subscription)
        .theme(application_theme)
        .run()
}

fn application_title(_: &Visualizer) -> String {
    format!("Latest {} Detections", VIEW_LIMIT)
}

fn application_subscription(_: &Visualizer) -> Subscription<Message> {
    Subscription::run(feed_stream).map(Message::Feed)
}

fn application_theme(_: &Visualizer) -> Theme {
    Theme::Dark
}

#[derive(Debug)]
struct Visualizer {
    viewer: ViewerState,
    date_input: String,
    date_error: Option<String>,
    status: String,
    history: Vec<String>,
}

#[derive(Debug, Clone)]
enum Message {
    Feed(FeedEvent),
    LocationSelected(LocationChoice),
    DateInputChanged(String),
    ClearFilters,
}

#[derive(Debug, Clone)]
enum FeedEvent {
    Connected(String),
    Snapshot(String),
    Disconnected(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LocationChoice {
    All,
    Location(String),
}

impl fmt::Display for LocationChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationChoice::All => f.write_str("All Locations"),
            LocationChoice::Location(name) => f.write_str(name),
        }
    }
}

impl Visualizer {
    fn boot() -> (Self, Task<Message>) {
        (
            Visualizer {
                viewer: ViewerState::new(viewer_zone()),
                date_input: String::new(),
                date_error: None,
                status: "Waiting for detections...".into(),
                history: Vec::new(),
            },
            Task::none(),
        )
    }

    fn update(state: &mut Self, message: Message) -> Task<Message> {
        match message {
            Message::Feed(FeedEvent::Connected(url)) => {
                state.status = format!("Connected to {url}");
                state.push_history(format!("Connected to {url}"));
            }
            Message::Feed(FeedEvent::Snapshot(payload)) => {
                match state.viewer.apply_message(&payload) {
                    Ok(view) => {
                        let shown = view.rows.len();
                        state.status = format!(
                            "Snapshot: {} detections, showing {}",
                            state.viewer.snapshot_len(),
                            shown
                        );
                    }
                    Err(err) => {
                        state.push_history(format!("Discarded snapshot: {err}"));
                    }
                }
            }
            Message::Feed(FeedEvent::Disconnected(reason)) => {
                state.status = format!("Feed lost ({reason}), showing last known table");
                state.push_history(format!("Disconnected: {reason}"));
            }
            Message::LocationSelected(LocationChoice::All) => {
                state.viewer.set_location_filter("");
            }
            Message::LocationSelected(LocationChoice::Location(name)) => {
                state.viewer.set_location_filter(name);
            }
            Message::DateInputChanged(value) => {
                state.date_error = state
                    .viewer
                    .set_date_filter_input(&value)
                    .err()
                    .map(|err| err.to_string());
                state.date_input = value;
            }
            Message::ClearFilters => {
                state.viewer.clear_filters();
                state.date_input = state.viewer.filters().date_input();
                state.date_error = None;
            }
        }
        Task::none()
    }

    fn view(state: &Self) -> Element<'_, Message> {
        let projected = state.viewer.view();
        let filters = state.viewer.filters();

        let mut choices = vec![LocationChoice::All];
        choices.extend(projected.locations.iter().cloned().map(LocationChoice::Location));
        let selected = if filters.location().is_empty() {
            LocationChoice::All
        } else {
            LocationChoice::Location(filters.location().to_string())
        };

        let filter_row = row![
            text("Filter by Location:").size(16),
            pick_list(choices, Some(selected), Message::LocationSelected).padding(6),
            text("Filter by Date:").size(16),
            text_input("YYYY-MM-DD", &state.date_input)
                .on_input(Message::DateInputChanged)
                .padding(6)
                .width(Length::Fixed(140.0)),
            button("Clear").on_press(Message::ClearFilters).padding(6),
        ]
        .spacing(12)
        .align_y(Alignment::Center);

        let date_hint = match &state.date_error {
            Some(err) => text(err.clone()).size(12),
            None => {
                let active = display_or_any(filters.date());
                text(format!("Active date filter: {active}")).size(12)
            }
        };

        let header = row![
            text("Date").size(14).width(Length::FillPortion(1)),
            text("Time").size(14).width(Length::FillPortion(1)),
            text("Location").size(14).width(Length::FillPortion(2)),
        ]
        .spacing(8);

        let rows = if projected.rows.is_empty() {
            Column::new().push(text("No detections to show").size(12))
        } else {
            projected
                .rows
                .iter()
                .fold(Column::new().spacing(4), |col, detection| {
                    col.push(
                        row![
                            text(detection.date.clone()).size(13).width(Length::FillPortion(1)),
                            text(detection.time.clone()).size(13).width(Length::FillPortion(1)),
                            text(detection.location.clone())
                                .size(13)
                                .width(Length::FillPortion(2)),
                        ]
                        .spacing(8),
                    )
                })
        };

        let history_list = if state.history.is_empty() {
            Column::new().push(text("No activity yet").size(12))
        } else {
            state
                .history
                .iter()
                .rev()
                .fold(Column::new().spacing(4), |col, entry| {
                    col.push(text(entry.clone()).size(12))
                })
        };

        let layout = column![
            text(format!("Latest {} Detections", VIEW_LIMIT)).size(28),
            filter_row,
            date_hint,
            text(&state.status).size(14),
            header,
            Container::new(scrollable(rows).height(Length::Fill)).padding(6),
            text("Activity log").size(16),
            Container::new(scrollable(history_list).height(Length::Fixed(90.0))).padding(6),
        ]
        .spacing(10)
        .padding(20);

        Container::new(layout)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn push_history(&mut self, entry: String) {
        self.history.push(entry);
        if self.history.len() > 20 {
            self.history.remove(0);
        }
    }
}

fn display_or_any(date: &str) -> &str {
    if date.is_empty() {
        "any"
    } else {
        date
    }
}

fn viewer_zone() -> FixedOffset {
    *Local::now().offset()
}

fn feed_url() -> String {
    std::env::var("FEED_URL").unwrap_or_else(|_| DEFAULT_FEED_URL.to_string())
}

/// Connects to the feed and forwards every text frame, reconnecting
/// after a short pause whenever the connection drops.
fn feed_stream() -> impl Stream<Item = FeedEvent> {
    stream::channel(16, |mut output: mpsc::Sender<FeedEvent>| async move {
        let url = feed_url();
        loop {
            match connect_async(url.as_str()).await {
                Ok((mut socket, _)) => {
                    let _ = output.send(FeedEvent::Connected(url.clone())).await;
                    let reason = loop {
                        match socket.next().await {
                            Some(Ok(WsMessage::Text(payload))) => {
                                let _ = output.send(FeedEvent::Snapshot(payload)).await;
                            }
                            Some(Ok(WsMessage::Close(_))) | None => {
                                break "closed by server".to_string();
                            }
                            Some(Ok(_)) => {}
                            Some(Err(err)) => break err.to_string(),
                        }
                    };
                    let _ = output.send(FeedEvent::Disconnected(reason)).await;
                }
                Err(err) => {
                    let _ = output.send(FeedEvent::Disconnected(err.to_string())).await;
                }
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    })
}
