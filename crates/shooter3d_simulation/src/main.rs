//! Headless симуляция Shooter3D
//!
//! Гоняет scripted матч без рендера: игрок крутится и стреляет, кадры по 60Hz.
//! Опционально: путь к JSON конфигу первым аргументом.

use bevy::prelude::*;
use shooter3d_simulation::scheduler::{EffectEvent, EffectsSink};
use shooter3d_simulation::session::MemoryStore;
use shooter3d_simulation::{log_error, FrameScheduler, PlayerIntent, SimulationConfig};

/// Считает эффекты для итоговой строки
#[derive(Default)]
struct CountingSink {
    shots: u32,
    hits: u32,
    deaths: u32,
}

impl EffectsSink for CountingSink {
    fn on_effect(&mut self, effect: &EffectEvent) {
        match effect {
            EffectEvent::ShotFired(_) => self.shots += 1,
            EffectEvent::HitLanded(_) => self.hits += 1,
            EffectEvent::EntityDied(_) => self.deaths += 1,
            EffectEvent::FireRejected(_) | EffectEvent::PickupCollected(_) => {}
        }
    }
}

impl Drop for CountingSink {
    fn drop(&mut self) {
        println!("Effects: {} shots, {} hits, {} deaths", self.shots, self.hits, self.deaths);
    }
}

fn main() {
    let config = match std::env::args().nth(1) {
        Some(path) => match SimulationConfig::from_json_file(&path) {
            Ok(config) => config,
            Err(err) => {
                log_error(&format!("{}", err));
                std::process::exit(1);
            }
        },
        None => SimulationConfig::default(),
    };
    let frame_dt = 1.0 / config.tick_hz;
    println!("Starting Shooter3D headless simulation (seed: {})", config.seed);

    let mut scheduler = FrameScheduler::new(config)
        .with_effects_sink(Box::new(CountingSink::default()))
        .with_store(Box::new(MemoryStore::new()));

    if let Err(err) = scheduler.new_match() {
        log_error(&format!("cannot start match: {}", err));
        std::process::exit(1);
    }

    // Запускаем 3600 кадров (минута матча)
    for frame in 0..3600u32 {
        let intent = PlayerIntent {
            movement: Vec2::new(0.0, if (frame / 120) % 2 == 0 { 1.0 } else { -1.0 }),
            look_delta: Vec2::new(0.01, 0.0),
            fire: frame % 10 < 5,
            reload: frame % 600 == 599,
            ..PlayerIntent::default()
        };
        let report = scheduler.frame(frame_dt, intent);

        if frame % 300 == 0 {
            println!(
                "Tick {}: {} entities, {:?}, score {}",
                report.snapshot.tick,
                report.snapshot.entities.len(),
                report.snapshot.session_state,
                report.snapshot.score
            );
        }
        if report.snapshot.session_state.is_finished() {
            println!("Match over at tick {}: {:?}", report.snapshot.tick, report.snapshot.session_state);
            break;
        }
    }

    if let Err(err) = scheduler.return_to_menu() {
        println!("Already in menu: {}", err);
    }
    if let Some(Ok(summaries)) = scheduler.store().map(|store| store.load_all()) {
        for summary in summaries {
            println!("Summary: {:?}", summary);
        }
    }
    println!("Simulation complete!");
}
