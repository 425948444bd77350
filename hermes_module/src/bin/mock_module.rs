//! Mock simulation module used by integration tests and demos.
//!
//! Behavior, driven by whichever of its signals exist:
//! - `v`: written with the current frame number each step.
//! - `x`, `y`: `y = x` passthrough each step.
//! - `nap_ms`: sleep this many milliseconds inside every step
//!   (failure injection for barrier-timeout tests).

use std::time::Duration;

use hermes_module::{
    init_module_logging, ModuleBehavior, ModuleContext, ModuleError, ModuleRuntime,
};

struct MockBehavior;

impl ModuleBehavior for MockBehavior {
    fn stage(&mut self, ctx: &ModuleContext) -> Result<(), ModuleError> {
        if ctx.has("v") {
            ctx.set("v", 0.0)?;
        }
        if ctx.has("y") {
            ctx.set("y", 0.0)?;
        }
        Ok(())
    }

    fn step(&mut self, ctx: &ModuleContext) -> Result<(), ModuleError> {
        if ctx.has("nap_ms") {
            let ms = ctx.get("nap_ms")?;
            if ms > 0.0 {
                std::thread::sleep(Duration::from_millis(ms as u64));
            }
        }
        if ctx.has("v") {
            ctx.set("v", ctx.frame() as f64)?;
        }
        if ctx.has("x") && ctx.has("y") {
            let x = ctx.get("x")?;
            ctx.set("y", x)?;
        }
        Ok(())
    }

    fn reset(&mut self, ctx: &ModuleContext) -> Result<(), ModuleError> {
        self.stage(ctx)
    }
}

fn main() {
    init_module_logging();

    let runtime = match ModuleRuntime::from_env() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("mock_module attach failed: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.run(&mut MockBehavior) {
        eprintln!("mock_module error: {e}");
        std::process::exit(1);
    }
}
