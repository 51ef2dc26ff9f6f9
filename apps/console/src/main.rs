use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use client_core::{
    CapturedPhoto, Notice, NoticeVariant, Overlay, PlayerIntent, SessionClient, SessionEvent,
    SessionView, PROLOGUE_DWELL,
};
use shared::domain::SessionKey;
use shared::protocol::TimelineEvent;

mod config;

/// Terminal player for a branching story session.
#[derive(Parser, Debug)]
struct Args {
    /// Session key issued by the game server.
    #[arg(long)]
    key: String,
    /// Overrides the configured server URL.
    #[arg(long)]
    server_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();
    let mut settings = config::load_settings();
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }

    let client = SessionClient::connect(&settings.server_url, SessionKey(args.key)).await?;
    let mut events = client.subscribe_events();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut printed = 0usize;

    let view = client.view().await;
    println!("== {} ==", view.title);
    render(&view, &mut printed);

    loop {
        let view = client.view().await;
        if view.overlay == Some(Overlay::Prologue) {
            // The prologue holds the screen until its dwell elapses or the
            // player skips it with enter.
            tokio::select! {
                _ = tokio::time::sleep(PROLOGUE_DWELL) => {}
                _ = lines.next_line() => {}
            }
            client.progress(None).await?;
            continue;
        }

        tokio::select! {
            event = events.recv() => match event {
                Ok(SessionEvent::Snapshot(view)) => render(&view, &mut printed),
                Ok(SessionEvent::Notice(notice)) => print_notice(&notice),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    print_notice(&Notice::warn(format!("missed {missed} updates")));
                    render(&client.view().await, &mut printed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_line(&client, line.trim()).await? {
                    break;
                }
            }
        }
    }

    client.close().await;
    Ok(())
}

async fn handle_line(client: &SessionClient, line: &str) -> Result<bool> {
    match line {
        "q" | "quit" => return Ok(false),
        "r" | "reset" => {
            client.reset().await?;
            print_notice(&Notice::success("progress cleared"));
        }
        "p" | "photo" => {
            client.progress(Some(PlayerIntent::StartPhotoTask)).await?;
        }
        "" => {
            if client.view().await.started {
                client.progress(None).await?;
            } else {
                client.start().await?;
                print_notice(&Notice::info("asking the server to start the story"));
            }
        }
        _ => {
            if let Some(path) = line.strip_prefix("s ") {
                submit_photo(client, path.trim()).await?;
            } else if let Ok(choice) = line.parse::<usize>() {
                if (1..=9).contains(&choice) {
                    client
                        .progress(Some(PlayerIntent::PickOption { index: choice - 1 }))
                        .await?;
                } else {
                    print_help();
                }
            } else {
                print_help();
            }
        }
    }
    Ok(true)
}

async fn submit_photo(client: &SessionClient, path: &str) -> Result<()> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            print_notice(&Notice::error(format!("could not read {path}: {err}")));
            return Ok(());
        }
    };
    let filename = std::path::Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "submission.jpg".into());
    let photo = CapturedPhoto::new(filename, bytes);
    client
        .progress(Some(PlayerIntent::SubmitPhoto { photo }))
        .await?;
    Ok(())
}

/// Prints whatever became visible since the last frame, then a prompt.
fn render(view: &SessionView, printed: &mut usize) {
    if view.visible.len() < *printed {
        // The log shrank, so the session was reset or rewritten.
        *printed = 0;
        println!("\n== {} ==", view.title);
    }
    for event in &view.visible[*printed..] {
        print_event(view, event);
    }
    *printed = view.visible.len();
    prompt(view);
}

fn prompt(view: &SessionView) {
    match view.overlay {
        Some(Overlay::PhotoCapture) => {
            println!("(camera open: submit with `s <file>`)");
            return;
        }
        Some(Overlay::Prologue) => return,
        Some(Overlay::Video) => {
            println!("(video playing: enter to continue)");
            return;
        }
        None => {}
    }
    if !view.started {
        println!("(enter to start)");
        return;
    }
    match &view.current {
        Some(TimelineEvent::PlayerPhotoTask { .. }) => println!("(p opens the camera)"),
        Some(TimelineEvent::PlayerDialogueOptions { options }) => {
            for (index, option) in options.iter().enumerate() {
                println!("  {}. {option}", index + 1);
            }
            println!("(pick an option by number)");
        }
        Some(TimelineEvent::WritingNewStoryAct) => println!("(the next act is being written...)"),
        Some(_) => println!("(enter to continue)"),
        None => println!("(caught up; waiting for the server)"),
    }
}

fn print_event(view: &SessionView, event: &TimelineEvent) {
    match event {
        TimelineEvent::CharacterDialogue {
            character_id,
            messages,
        } => {
            let name = view
                .character(*character_id)
                .map(|character| character.name.as_str())
                .unwrap_or("???");
            for message in messages {
                println!("{name}: {message}");
            }
        }
        TimelineEvent::PlayerPhotoTask { requirements } => {
            println!("[photo task] {}", requirements.join(", "));
        }
        TimelineEvent::PlayerDialogueOptions { .. } => {
            println!("[your choice]");
        }
        TimelineEvent::NewStoryAct { story_act_id } => {
            println!("--- act {} ---", story_act_id.0);
        }
        TimelineEvent::WritingNewStoryAct => {}
        TimelineEvent::ShowStoryPrologue { lines } => {
            for line in lines {
                println!("  {line}");
            }
        }
        TimelineEvent::ShowVideo { video_url } => {
            println!("[video] {video_url}");
        }
        TimelineEvent::SubmitPhoto { photo_url } => {
            if photo_url.is_empty() {
                println!("[you submitted a photo]");
            } else {
                println!("[you submitted a photo] {photo_url}");
            }
        }
        TimelineEvent::Unknown => {}
    }
}

fn print_notice(notice: &Notice) {
    let tag = match notice.variant {
        NoticeVariant::Info => "info",
        NoticeVariant::Warn => "warn",
        NoticeVariant::Error => "error",
        NoticeVariant::Success => "ok",
    };
    println!("[{tag}] {}", notice.text);
}

fn print_help() {
    println!("commands: enter = continue, 1-9 = pick an option, p = open the camera,");
    println!("          s <file> = submit a photo, r = reset the story, q = quit");
}
