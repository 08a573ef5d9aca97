//! Map-reduce parallel check orchestration.
//!
//! The run moves through SPAWNING (workers rebuild identical pipelines from
//! a serialized task snapshot), COLLECTING (per-file results arrive in
//! completion order; diagnostics are forwarded immediately, statistics are
//! merged), and REDUCING (consolidated map fragments are replayed into a
//! coordinator-side pipeline exactly once). Workers never touch coordinator
//! state; everything crosses the boundary by value. A worker failure aborts
//! the whole run: partially collected map-reduce data could otherwise
//! produce a misleadingly clean result.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::thread;

use crossbeam::channel::unbounded;
use tracing::{debug, info};

use crate::core::checkers::{CheckerRegistry, Session, TaskConfig};
use crate::core::config::NornConfig;
use crate::core::driver::{
    check_file, forward_messages, reduce_fragments, FileOutcome, RunOutcome, SequentialDriver,
};
use crate::core::errors::{NornError, Result};
use crate::core::reporter::Reporter;
use crate::core::stats::RunStats;
use crate::lang::ModuleParser;

/// Parallel check driver over a pool of workers.
pub struct ParallelOrchestrator<'a> {
    config: &'a NornConfig,
    registry: &'a CheckerRegistry,
    parser: &'a dyn ModuleParser,
}

impl<'a> ParallelOrchestrator<'a> {
    /// Create an orchestrator; the worker count comes from the config.
    pub fn new(
        config: &'a NornConfig,
        registry: &'a CheckerRegistry,
        parser: &'a dyn ModuleParser,
    ) -> Self {
        ParallelOrchestrator {
            config,
            registry,
            parser,
        }
    }

    /// Check all files, producing the same diagnostics and statistics a
    /// sequential run over the same files would.
    pub fn run(&self, files: &[PathBuf], reporter: &mut dyn Reporter) -> Result<RunOutcome> {
        let jobs = self.config.run.jobs.min(files.len().max(1));
        if jobs <= 1 {
            let task = self.registry.task_config(self.config);
            let session = Session::build(self.registry, &task)?;
            let mut driver = SequentialDriver::with_session(session, self.parser);
            return driver.run(files, reporter);
        }

        info!(files = files.len(), jobs, "starting parallel run");
        let task = self.registry.task_config(self.config);
        // Workers receive the snapshot serialized, never the live objects.
        let task_json = serde_json::to_string(&task)?;

        let (job_tx, job_rx) = unbounded::<PathBuf>();
        let (result_tx, result_rx) = unbounded::<(usize, Result<FileOutcome>)>();
        for path in files {
            job_tx
                .send(path.clone())
                .map_err(|_| NornError::worker("job queue closed before dispatch"))?;
        }
        drop(job_tx);

        let mut stats = RunStats::new();
        let mut exit_flags = 0;
        let mut fragments: Vec<(String, serde_json::Value)> = Vec::new();

        thread::scope(|scope| -> Result<()> {
            for worker_id in 0..jobs {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let task_json = task_json.as_str();
                let registry = self.registry;
                let parser = self.parser;
                scope.spawn(move || {
                    let mut session = match serde_json::from_str::<TaskConfig>(task_json)
                        .map_err(NornError::from)
                        .and_then(|task| Session::build(registry, &task))
                    {
                        Ok(session) => session,
                        Err(err) => {
                            let _ = result_tx.send((worker_id, Err(err)));
                            return;
                        }
                    };
                    for checker in &mut session.checkers {
                        checker.open();
                    }
                    debug!(worker_id, "worker pipeline ready");
                    for path in job_rx.iter() {
                        let outcome = catch_unwind(AssertUnwindSafe(|| {
                            check_file(
                                parser,
                                &mut session.checkers,
                                &mut session.tracker,
                                &path,
                            )
                        }))
                        .unwrap_or_else(|_| {
                            Err(NornError::worker_id(
                                format!("worker panicked while checking {}", path.display()),
                                worker_id,
                            ))
                        });
                        let failed = outcome.is_err();
                        if result_tx.send((worker_id, outcome)).is_err() || failed {
                            return;
                        }
                    }
                });
            }
            drop(result_tx);

            let mut received = 0;
            while received < files.len() {
                match result_rx.recv() {
                    Ok((_, Ok(outcome))) => {
                        received += 1;
                        reporter.on_module_start(&outcome.module, Path::new(&outcome.display_path));
                        exit_flags |= forward_messages(&outcome.messages, reporter);
                        stats.merge(&outcome.stats);
                        fragments.extend(outcome.fragments);
                    }
                    Ok((worker_id, Err(err))) => {
                        return Err(NornError::worker_id(err.to_string(), worker_id));
                    }
                    Err(_) => {
                        return Err(NornError::worker(
                            "a worker exited before all results were collected",
                        ));
                    }
                }
            }
            Ok(())
        })?;

        // REDUCING: exactly once, on coordinator-side checker instances.
        let mut session = Session::build(self.registry, &task)?;
        let (reduce_messages, reduce_stats) =
            reduce_fragments(fragments, &mut session.checkers, &mut session.tracker)?;
        exit_flags |= forward_messages(&reduce_messages, reporter);
        stats.merge(&reduce_stats);

        reporter.on_run_end(&stats, None);
        Ok(RunOutcome { stats, exit_flags })
    }
}
