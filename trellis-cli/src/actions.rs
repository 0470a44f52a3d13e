use std::io::{self, BufRead, Write};

use clap::Parser;
use trellis_core::{Config, JobStore, JobSubmitter, config, get_jobs, retry, viz};

use crate::args::{Cli, Commands, VizModeArg};

pub(crate) fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut cfg = match &cli.global.config_file {
        Some(path) => Config::load_file(path)?,
        None => Config::load()?,
    };
    if let Some(db) = &cli.global.db {
        cfg.db_path = db.clone();
    }

    match cli.command {
        Commands::Submit {
            file,
            dry,
            debug,
            deptype,
        } => {
            if let Some(deptype) = deptype {
                cfg.dep_kind = deptype.into();
            }
            cfg.debug |= debug;
            cfg.dry |= dry;

            let store = JobStore::open(&cfg.db_path)?;
            let mut submitter = JobSubmitter::new(store, cfg.client(), cfg.dep_kind);
            submitter.dry = cfg.dry;
            let ids = submitter.submit_workflow(&file)?;
            println!("Submitted {} job(s)", ids.len());
        }

        Commands::Status { filters, cols } => {
            let store = JobStore::open(&cfg.db_path)?;
            let jobs = get_jobs(&store, &cfg.client(), &filters, true)?;
            if jobs.is_empty() {
                println!("No jobs found.");
            } else {
                println!("{}", viz::render_table(&jobs, &cols)?);
            }
        }

        Commands::Viz { filters, mode } => {
            let store = JobStore::open(&cfg.db_path)?;
            let jobs = get_jobs(&store, &cfg.client(), &filters, true)?;
            match mode {
                VizModeArg::Main => println!("{}", viz::render_main(&jobs)),
                VizModeArg::Mermaid => {
                    println!("{}", viz::render_mermaid(&jobs));
                    println!("Copy the above to https://mermaid.live to visualize.");
                }
                VizModeArg::Group => println!("{}", viz::render_grouped(&jobs)),
                VizModeArg::Json => println!("{}", viz::render_json(&jobs)?),
            }
        }

        Commands::Cancel { job_ids } => {
            let store = JobStore::open(&cfg.db_path)?;
            let submitter = JobSubmitter::new(store, cfg.client(), cfg.dep_kind);
            if job_ids.is_empty() {
                submitter.cancel_all()?;
            } else {
                submitter.cancel(&job_ids);
            }
        }

        Commands::Retry {
            job_ids,
            node_ids,
            force,
            debug,
            dry,
            deptype,
        } => {
            if let Some(deptype) = deptype {
                cfg.dep_kind = deptype.into();
            }
            cfg.debug |= debug;
            cfg.dry |= dry;

            let store = JobStore::open(&cfg.db_path)?;
            let mut submitter = JobSubmitter::new(store, cfg.client(), cfg.dep_kind);
            submitter.dry = cfg.dry;
            if !node_ids.is_empty() {
                retry::retry_by_node(&mut submitter, &node_ids, force)?;
            } else {
                for job_id in &job_ids {
                    retry::retry(&mut submitter, job_id, force)?;
                }
            }
        }

        Commands::Delete { job_ids, node_ids } => {
            if !node_ids.is_empty() {
                let store = JobStore::open(&cfg.db_path)?;
                let deleted = store.delete_by_node(&node_ids)?;
                println!("Deleted {deleted} job(s)");
            } else if !job_ids.is_empty() {
                let store = JobStore::open(&cfg.db_path)?;
                for job_id in &job_ids {
                    store.delete_job(job_id, true)?;
                }
            } else if confirm("Are you sure you want to delete the database? (y/n): ")? {
                if cfg.db_path.exists() {
                    std::fs::remove_file(&cfg.db_path)?;
                    println!("Deleted {}", cfg.db_path.display());
                } else {
                    println!("Nothing to delete at {}", cfg.db_path.display());
                }
            } else {
                println!("Database deletion cancelled.");
            }
        }

        Commands::Batch { args } => {
            let store = JobStore::open(&cfg.db_path)?;
            let mut submitter = JobSubmitter::new(store, cfg.client(), cfg.dep_kind);
            let job_id = submitter.submit_passthrough(&args)?;
            println!("Submitted job {job_id}");
        }

        Commands::Info => {
            println!("Cache directory: {}", config::cache_dir().display());
            println!("Database file: {}", cfg.db_path.display());
            if cfg.db_path.exists() {
                let store = JobStore::open(&cfg.db_path)?;
                println!("Recorded jobs: {}", store.count_jobs()?);
            } else {
                println!("Recorded jobs: 0 (database not created yet)");
            }
        }
    }

    Ok(())
}

fn confirm(question: &str) -> io::Result<bool> {
    print!("{question}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().eq_ignore_ascii_case("y"))
}
