//! Status command: show configured jobs and persisted next runs.

use std::path::Path;

use miette::{Result, miette};

use autopost_scheduler::{JsonStateStore, StateStore};

use crate::daemon::{load_job_table, parse_timezone};

pub fn run(timezone: &str, state_file: &Path, jobs_file: Option<&Path>) -> Result<()> {
    let tz = parse_timezone(timezone)?;
    let table = load_job_table(jobs_file)?;
    let store = JsonStateStore::new(state_file);
    let state = store.load().map_err(|e| miette!("{}", e))?;

    println!("{} jobs ({})", table.len(), timezone);
    for job in table.jobs() {
        match state.get(&job.id) {
            Some(next) => println!(
                "  {:<12} {:<7} {:<6} next {}  ({} local)",
                job.id,
                job.slot.to_string(),
                format!("{:?}", job.kind).to_lowercase(),
                next.to_rfc3339(),
                next.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S")
            ),
            None => println!(
                "  {:<12} {:<7} {:<6} not scheduled yet",
                job.id,
                job.slot.to_string(),
                format!("{:?}", job.kind).to_lowercase()
            ),
        }
    }

    Ok(())
}
