use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tweenline::{
    run, AnimationEngine, AnimationOptions, Color, Easing, PropertyBag, PropertyValue, Repeat,
};

fn props(pairs: &[(&str, PropertyValue)]) -> HashMap<String, PropertyValue> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    println!("🎬 Tweenline showcase");
    println!("======================\n");

    let engine = Arc::new(tokio::sync::Mutex::new(AnimationEngine::new()));
    tokio::spawn(run(Arc::clone(&engine)));

    // A bouncing drop, a color fade, and a yoyo pulse, staggered on one timeline
    let ball = PropertyBag::new().with("y", 0.0).into_shared();
    let swatch = PropertyBag::new()
        .with("fill", Color::new(0.1, 0.1, 0.1, 1.0))
        .into_shared();
    let pulse = PropertyBag::new().with("scale", 1.0).into_shared();

    let mut rx = {
        let mut guard = engine.lock().await;
        let builder = guard
            .timeline()
            .child_with(
                ball.clone(),
                props(&[("y", PropertyValue::Number(300.0))]),
                Duration::from_millis(800),
                Duration::ZERO,
                AnimationOptions::new().with_easing(Easing::Bounce),
            )
            .child_with(
                swatch.clone(),
                props(&[(
                    "fill",
                    PropertyValue::Color(Color::new(0.9, 0.4, 0.1, 1.0)),
                )]),
                Duration::from_millis(600),
                Duration::from_millis(200),
                AnimationOptions::new().with_easing(Easing::EaseInOutCubic),
            )
            .child_with(
                pulse.clone(),
                props(&[("scale", PropertyValue::Number(1.4))]),
                Duration::from_millis(250),
                Duration::from_millis(400),
                AnimationOptions::new()
                    .with_easing(Easing::EaseInOut)
                    .with_repeat(Repeat::Count(1))
                    .with_yoyo(),
            );
        let id = guard.play_timeline(builder)?;
        guard.subscribe(id).expect("timeline just registered")
    };

    rx.wait_for(|state| state.is_terminal()).await?;

    let y = tweenline::target::read_property(&ball, "y")
        .and_then(|value| value.as_number())
        .unwrap_or_default();
    let scale = tweenline::target::read_property(&pulse, "scale")
        .and_then(|value| value.as_number())
        .unwrap_or_default();
    println!("✅ Timeline complete: y = {y}, scale back to {scale}");

    if let Some(PropertyValue::Color(fill)) =
        tweenline::target::read_property(&swatch, "fill")
    {
        println!("🎨 Swatch settled on {}", fill.to_hex_string());
    }

    let metrics = engine.lock().await.metrics();
    println!(
        "📊 {} animations created, {} errors, avg frame {:?}",
        metrics.total_created, metrics.error_count, metrics.average_frame_time
    );

    Ok(())
}
