//! A demo which plays the ambient soundscape and walks through the engine's controls:
//! whir delay profiles, muting and unmuting the chains, main volume changes and pausing.

use std::{thread, time::Duration};

use aetheryte::{EngineConfig, Error, WhirDelayProfile};

// -------------------------------------------------------------------------------------------------

#[cfg(all(debug_assertions, feature = "assert-allocs"))]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

// -------------------------------------------------------------------------------------------------

// Common demo code
#[path = "./common/arguments.rs"]
mod arguments;

// -------------------------------------------------------------------------------------------------

fn main() -> Result<(), Error> {
    // Parse optional arguments
    let args = arguments::parse();

    // Load assets and create an engine with the output device as configured via arguments
    let store = arguments::asset_store(&args);
    let engine = arguments::new_engine(&args, &store, EngineConfig::default())?;

    engine.with(|engine| -> Result<(), Error> {
        // Start playing with the default, frequent whirs
        engine.toggle()?;
        println!("Playing: {:?}", engine.status());
        thread::sleep(Duration::from_secs(10));

        // Whirs only every few seconds
        engine.set_whir_delay_profile(WhirDelayProfile::Infrequent);
        println!("Whir delay profile: {}", engine.status().whir_delay_profile);
        thread::sleep(Duration::from_secs(10));

        // Hum only, then whirs only
        engine.set_play_whirs(false);
        println!("Whirs muted");
        thread::sleep(Duration::from_secs(5));
        engine.set_play_whirs(true);
        engine.set_play_hum(false);
        engine.set_whir_delay_profile(WhirDelayProfile::InGame);
        println!("Hum muted");
        thread::sleep(Duration::from_secs(5));
        engine.set_play_hum(true);

        // Fade out the main volume
        for step in (0..=10).rev() {
            engine.set_main_volume(step as f32 / 20.0);
            thread::sleep(Duration::from_millis(500));
        }

        // Pause, resume and pause again
        engine.toggle()?;
        println!("Paused: {:?}", engine.status());
        thread::sleep(Duration::from_secs(1));
        engine.set_main_volume(0.5);
        engine.toggle()?;
        thread::sleep(Duration::from_secs(5));
        engine.toggle()?;

        Ok(())
    })
}
