use super::{skip, BenchContext, BenchRegistry};
use anyhow::anyhow;
use envbench_harness::{Outcome, RegistryError};
use rand::rngs::{SmallRng, StdRng};
use rand::{Rng, SeedableRng, TryRngCore};
use std::hint::black_box;

pub(super) fn register(registry: &mut BenchRegistry) -> Result<(), RegistryError> {
    registry.register_fn("rand", "thread_rng", thread_rng)?;
    registry.register_fn("rand", "std_rng", std_rng)?;
    registry.register_fn("rand", "small_rng", small_rng)?;
    registry.register_fn("rand", "os_random_int", os_random_int)?;
    registry.register_fn("rand", "os_random_bytes", os_random_bytes)
}

/// Draws `count` integers from `0..=i` for increasing `i`.
fn draw_integers(rng: &mut impl Rng, count: u64) {
    for i in 0..count {
        black_box(rng.random_range(0..=i));
    }
}

fn thread_rng(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let count = ctx.scaled(1_000_000);
    draw_integers(&mut rand::rng(), count);
    Ok(Outcome::Completed(count))
}

fn std_rng(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let count = ctx.scaled(1_000_000);
    draw_integers(&mut StdRng::from_rng(&mut rand::rng()), count);
    Ok(Outcome::Completed(count))
}

fn small_rng(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let count = ctx.scaled(1_000_000);
    draw_integers(&mut SmallRng::from_rng(&mut rand::rng()), count);
    Ok(Outcome::Completed(count))
}

fn os_random_int(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let rng = match ctx.resources().secure_random() {
        Ok(rng) => rng,
        Err(unavailable) => return Ok(skip(&unavailable)),
    };
    let count = ctx.scaled(1_000_000);
    // Panics if the source fails after the check, the runner reports that as a failure.
    draw_integers(&mut rng.unwrap_err(), count);
    Ok(Outcome::Completed(count))
}

fn os_random_bytes(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let mut rng = match ctx.resources().secure_random() {
        Ok(rng) => rng,
        Err(unavailable) => return Ok(skip(&unavailable)),
    };
    let count = ctx.scaled(1_000_000);
    let mut buffer = [0_u8; 32];
    for _ in 0..count {
        rng.try_fill_bytes(&mut buffer)
            .map_err(|e| anyhow!("OS random source failed: {e}"))?;
        black_box(&buffer);
    }
    Ok(Outcome::Completed(count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drawn_integers_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for i in 0..1000_u64 {
            assert!(rng.random_range(0..=i) <= i);
        }
        draw_integers(&mut rng, 0);
    }
}
