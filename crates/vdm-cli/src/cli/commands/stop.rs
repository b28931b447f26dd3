//! `vdm start <id>` / `vdm stop <id>` / `vdm stop-all`.

use anyhow::Result;

use crate::cli::commands::persist_queue;
use crate::cli::AppContext;

pub fn run_start(ctx: &AppContext, id: u64) -> Result<()> {
    if ctx.service.start(id) {
        println!("Started task {id}");
        persist_queue(ctx);
    } else {
        println!("Task {id} could not be started (unknown, terminal, or already active)");
    }
    Ok(())
}

pub fn run_stop(ctx: &AppContext, id: u64) -> Result<()> {
    if ctx.service.stop(id) {
        println!("Requested cancellation of task {id}");
        persist_queue(ctx);
    } else {
        println!("Task {id} is not active");
    }
    Ok(())
}

pub fn run_stop_all(ctx: &AppContext) -> Result<()> {
    ctx.service.stop_all();
    println!("Requested cancellation of {} active task(s)", ctx.service.active_count());
    persist_queue(ctx);
    Ok(())
}
