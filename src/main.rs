use anyhow::Result;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

mod bus;
mod extract;
mod frame;
mod highlight;
mod hover;
mod i18n;
mod language;
mod page;
mod settings;
mod tooltip;
mod translate;
mod utils;

use hover::{HoverEngine, TranslateJob};
use page::{Page, Point, Rect};
use settings::SettingsStore;
use tooltip::{PanelBlock, TooltipPanel};
use translate::Router;

const APP_NAME: &str = "HoverLens";

fn init_logging(debug_mode: bool) {
    use tracing_subscriber::EnvFilter;
    // RUST_LOG wins; otherwise the persisted debug_mode setting picks the level.
    let default_directives = if debug_mode { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let store = SettingsStore::open()?;
    init_logging(store.get().debug_mode);
    tracing::info!("{} version {}", APP_NAME, env!("CARGO_PKG_VERSION"));
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(|s| s.as_str()) {
        Some("--demo") => run_hover_demo(&store),
        Some(_) => translate_once(&store, &args.join(" ")),
        None => {
            eprintln!("usage: hoverlens <text to translate> | hoverlens --demo");
            Ok(())
        }
    }
}

/// One-shot lookup: detect, route, and print the tooltip the way the panel
/// would lay it out.
fn translate_once(store: &SettingsStore, text: &str) -> Result<()> {
    let settings = store.get().clone();
    let detected = language::detect(text, settings.language_mode);
    if detected == language::DetectedLanguage::Skip {
        println!("(language mode {:?} rules this text out)", settings.language_mode);
        return Ok(());
    }

    let router = Router::new(settings.backend.clone());
    let result = router.translate(text, detected.code());

    let panel = tooltip::render(
        &result,
        Rect::new(0.0, 0.0, 200.0, 20.0),
        (800.0, 600.0),
        Point::default(),
        &settings,
    );
    print!("{}", panel_text(&panel));
    Ok(())
}

/// Scripted hover session over a built-in fixture page: pointer settles over
/// a Japanese span, the debounce timer fires, and the response is fed back
/// into the engine. Exercises the full extract → translate → render path.
fn run_hover_demo(store: &SettingsStore) -> Result<()> {
    let settings = store.get().clone();
    let router = Arc::new(Router::new(settings.backend.clone()));

    let mut page = Page::new(800.0, 600.0);
    let para = page.add_element(page.root(), "p", Some(Rect::new(40.0, 40.0, 300.0, 24.0)));
    page.add_text(
        para,
        "今日はいい天気ですね。",
        Some(Rect::new(40.0, 40.0, 300.0, 24.0)),
    );
    let overlay = page.add_element(page.root(), "div", None);
    page.mark_overlay(overlay);

    let mut engine = HoverEngine::new(settings.clone());
    engine.set_tooltip_container(overlay);

    // The demo runs the blocking backend call on a worker thread and hands
    // the result back to the single-threaded engine loop.
    let inbox: Arc<Mutex<Vec<(u64, translate::TranslationResult)>>> =
        Arc::new(Mutex::new(Vec::new()));
    let dispatch_inbox = inbox.clone();
    let dispatch_router = router.clone();
    engine.set_dispatch(Arc::new(move |job: TranslateJob| {
        let inbox = dispatch_inbox.clone();
        let router = dispatch_router.clone();
        std::thread::spawn(move || {
            let result = router.translate(&job.text, &job.source_language);
            inbox.lock().unwrap().push((job.request_id, result));
        });
    }));

    let start = Instant::now();
    let cursor = Point::new(120.0, 50.0);
    engine.on_mouse_over(&page, para, cursor, start);
    tracing::info!("pointer settled at ({}, {})", cursor.x, cursor.y);

    // Event loop: pump deadlines, then wait briefly for the response.
    let deadline = start + Duration::from_secs(15);
    loop {
        let now = Instant::now();
        engine.poll(&page, now);
        for (id, result) in inbox.lock().unwrap().drain(..) {
            engine.on_response(&page, id, result, now);
        }
        if engine.tooltip().is_some() || now > deadline {
            break;
        }
        std::thread::sleep(Duration::from_millis(25));
    }

    match engine.tooltip() {
        Some(panel) => {
            tracing::info!(
                "tooltip at ({:.0}, {:.0}), {} wide",
                panel.position.x,
                panel.position.y,
                panel.width
            );
            print!("{}", panel_text(panel));
        }
        None => println!("(no tooltip was produced)"),
    }
    Ok(())
}

fn panel_text(panel: &TooltipPanel) -> String {
    let mut out = String::new();
    for block in &panel.blocks {
        match block {
            PanelBlock::Original(t) => out.push_str(&format!("{}\n", t)),
            PanelBlock::Pronunciation(t) => out.push_str(&format!("[{}]\n", t)),
            PanelBlock::Translation(t) => out.push_str(&format!("{}\n", t)),
            PanelBlock::Definitions { header, items } => {
                out.push_str(&format!("{}\n", header));
                for item in items {
                    out.push_str(&format!("  • {}\n", item));
                }
            }
            PanelBlock::Examples { header, items } => {
                out.push_str(&format!("{}\n", header));
                for ex in items {
                    out.push_str(&format!("  {}\n    {}\n", ex.text, ex.translation));
                }
            }
        }
    }
    out
}
