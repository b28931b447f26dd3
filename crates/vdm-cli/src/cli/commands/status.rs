//! `vdm status <id>` — print a single task's full record.

use anyhow::Result;

use crate::cli::AppContext;

pub fn run_status(ctx: &AppContext, id: u64) -> Result<()> {
    match ctx.queue.get(id) {
        Some(task) => {
            println!("id:              {}", task.id);
            println!("url:             {}", task.descriptor.url);
            println!("status:          {:?}", task.status);
            println!("progress:        {:.1}%", task.progress);
            println!("download_path:   {}", task.download_path);
            println!("created_at:      {}", task.created_at);
            println!("completed_at:    {:?}", task.completed_at);
            println!("error_message:   {:?}", task.error_message);
        }
        None => println!("No task with id {id}"),
    }
    Ok(())
}
