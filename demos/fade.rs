use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tweenline::{
    run, AnimationEngine, AnimationOptions, PlaybackState, PropertyBag, PropertyValue,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    println!("🎬 Fade demo");
    println!("=============");
    println!("Animates an opacity property from 0 to 1 over one second\n");

    let engine = Arc::new(tokio::sync::Mutex::new(AnimationEngine::new()));
    tokio::spawn(run(Arc::clone(&engine)));

    let target = PropertyBag::new().with("opacity", 0.0).into_shared();

    let mut rx = {
        let mut guard = engine.lock().await;
        let id = guard
            .animate(
                target.clone(),
                HashMap::from([("opacity".to_string(), PropertyValue::Number(1.0))]),
                Duration::from_millis(1000),
                AnimationOptions::new()
                    .with_easing_name("ease-out")
                    .on_update(|progress| {
                        if (progress * 10.0).fract() < 0.05 {
                            println!("   ▸ progress {:.0}%", progress * 100.0);
                        }
                        Ok(())
                    }),
            )?
            .expect("animations enabled");
        guard.subscribe(id).expect("animation just registered")
    };

    rx.wait_for(|state| state.is_terminal()).await?;
    assert_eq!(*rx.borrow(), PlaybackState::Completed);

    let opacity = tweenline::target::read_property(&target, "opacity")
        .and_then(|value| value.as_number())
        .unwrap_or_default();
    println!("\n✅ Fade finished, opacity = {opacity}");

    let metrics = engine.lock().await.metrics();
    println!(
        "📊 {} created, avg frame {:?}",
        metrics.total_created, metrics.average_frame_time
    );

    Ok(())
}
