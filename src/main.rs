use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::info;

use chairtime::config::Config;
use chairtime::directory::{InMemoryCatalog, InMemoryDirectory, ServiceCatalog};
use chairtime::engine::{Collaborators, Engine};
use chairtime::model::*;
use chairtime::seed::Seed;
use chairtime::store::InMemoryRemoteStore;
use chairtime::sync::SyncDispatcher;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    chairtime::observability::init(config.metrics_port)?;

    let directory = Arc::new(InMemoryDirectory::default());
    let catalog = Arc::new(InMemoryCatalog::new());
    let store = Arc::new(InMemoryRemoteStore::new());
    match &config.seed_path {
        Some(path) => {
            Seed::from_path(path)?.install(&directory, &catalog, &store);
        }
        None => info!("CHAIRTIME_SEED not set, starting with an empty salon"),
    }

    let deps = Collaborators {
        remote: store,
        directory,
        catalog: catalog.clone(),
        sync: SyncDispatcher::disabled(),
    };
    let engine = Arc::new(Engine::new(deps, config.tz));
    engine.load().await?;

    let date = config
        .date
        .unwrap_or_else(|| Utc::now().with_timezone(&config.tz).date_naive());
    info!("chairtime agenda for {date} ({})", config.tz);
    print_agenda(&engine, catalog.as_ref(), date);

    if config.listen {
        let subscription = engine.listen();
        let mut changes = engine.board.subscribe();
        info!("following store changes, ctrl-c to stop");

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    print_agenda(&engine, catalog.as_ref(), date);
                }
                _ = &mut shutdown => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }
        subscription.unsubscribe();
    }

    info!("chairtime stopped");
    Ok(())
}

fn print_agenda(engine: &Engine, catalog: &dyn ServiceCatalog, date: NaiveDate) {
    let tz = engine.tz();
    for section in engine.agenda(date) {
        let hours = section.window.map_or("closed".to_string(), |w| {
            format!("{}-{}", clock_minutes(w.start_minutes), clock_minutes(w.end_minutes))
        });
        println!("resource {} [{hours}]", section.resource_id);
        if section.lines.is_empty() {
            println!("  (no bookings)");
        }
        for line in section.lines {
            let service = catalog
                .service(line.service_id)
                .map_or_else(|| line.service_id.to_string(), |s| s.name);
            let mut flags = Vec::new();
            if line.conflicting {
                flags.push("CONFLICT".to_string());
            }
            if line.out_of_hours {
                flags.push("out of hours".to_string());
            }
            if line.tentative {
                flags.push("tentative".to_string());
            }
            if let Some(delta) = line.pending_delta_minutes {
                flags.push(format!("pending {delta:+} min"));
            }
            println!(
                "  {}-{} (free {}) {service} {}{}",
                clock(line.span.start, tz),
                clock(line.span.end, tz),
                clock(line.effective_end, tz),
                line.id,
                if flags.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", flags.join(", "))
                },
            );
        }
    }
}

fn clock(t: Ms, tz: Tz) -> String {
    DateTime::from_timestamp_millis(t)
        .map(|dt| dt.with_timezone(&tz).format("%H:%M").to_string())
        .unwrap_or_else(|| "??:??".into())
}

fn clock_minutes(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}
