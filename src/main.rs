use anyhow::{Context, Result};
use clap::Parser;
use neuromap::architect::ArchitectService;
use neuromap::impact::ImpactReport;
use neuromap::scanner::{ScanOptions, SourceScanner};
use neuromap::{cli, logging, rpc};
use std::path::Path;

fn open_service(root: &Path, no_ignore: bool) -> Result<ArchitectService> {
    let root = std::fs::canonicalize(root)
        .with_context(|| format!("project root {} is not accessible", root.display()))?;
    if !root.is_dir() {
        anyhow::bail!("project root {} is not a directory", root.display());
    }
    let scanner = SourceScanner::python(ScanOptions::new(no_ignore))?;
    Ok(ArchitectService::with_scanner(root, scanner))
}

fn main() -> Result<()> {
    logging::init_logging();
    let args = cli::Args::parse();

    match args.command {
        cli::Command::Serve { root, no_ignore } => rpc::serve(root, ScanOptions::new(no_ignore)),
        cli::Command::Request {
            root,
            method,
            params,
            params_file,
            id,
            no_ignore,
        } => {
            let params_raw = if let Some(path) = params_file {
                std::fs::read_to_string(&path)
                    .with_context(|| format!("read params file {}", path.display()))?
            } else {
                params
            };
            let response = rpc::call(
                root,
                ScanOptions::new(no_ignore),
                method,
                &params_raw,
                &id,
            )?;
            println!("{response}");
            Ok(())
        }
        cli::Command::Snapshot { root, no_ignore } => {
            let service = open_service(&root, no_ignore)?;
            println!("{}", serde_json::to_string_pretty(&service.snapshot())?);
            Ok(())
        }
        cli::Command::Impact {
            root,
            node,
            no_ignore,
        } => {
            let service = open_service(&root, no_ignore)?;
            let prediction = service.analyze_impact(&node);
            println!(
                "{}",
                serde_json::to_string_pretty(&ImpactReport::from(&prediction))?
            );
            Ok(())
        }
    }
}
