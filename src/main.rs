use std::path::Path;

use clap::Parser;
use muster::cli::{Cli, Command};
use muster::collect;
use muster::config::Config;
use muster::report;
use muster::store::diff::{DiffResult, DiffType};
use muster::store::{diff, Status, Store, StoreError};

fn load_config(path: Option<&Path>) -> Config {
    match Config::load(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            std::process::exit(1);
        }
    }
}

fn open_store(config: &Config) -> Store {
    match Store::open(&config.dsn) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

fn print_diff(result: &DiffResult) {
    println!(
        "\nComparing {}: version {} -> {}",
        result.source, result.from_version, result.to_version
    );
    println!();

    if result.entries.is_empty() {
        println!("No changes detected.");
        return;
    }

    let added: Vec<_> = result
        .entries
        .iter()
        .filter(|e| e.diff_type == DiffType::Added)
        .collect();
    let removed: Vec<_> = result
        .entries
        .iter()
        .filter(|e| e.diff_type == DiffType::Removed)
        .collect();
    let changed: Vec<_> = result
        .entries
        .iter()
        .filter(|e| e.diff_type == DiffType::Changed)
        .collect();

    for entry in added {
        println!("  [+] {} ({}) appeared", entry.name, entry.kind);
    }

    for entry in removed {
        println!("  [-] {} ({}) is gone", entry.name, entry.kind);
    }

    for entry in changed {
        println!("  [~] {} ({}) changed", entry.name, entry.kind);
        for change in &entry.changes {
            println!("      {}: {} -> {}", change.field, change.old, change.new);
        }
    }
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Collect(args) => {
            let config = load_config(args.config.as_deref());
            let result = collect::run(&config, args.source.as_deref(), args.verbose);
            let mut store = open_store(&config);

            let commits = match store.save(&result.records, result.duration) {
                Ok(commits) => commits,
                Err(StoreError::EmptyBatch) => {
                    eprintln!("warning: no records collected; nothing to commit");
                    Vec::new()
                }
                Err(e) => {
                    eprintln!("Error saving snapshot: {e}");
                    std::process::exit(1);
                }
            };

            for failure in &result.failures {
                if let Err(e) = store.log_status(
                    &failure.source,
                    failure.status,
                    result.duration,
                    Some(&failure.error),
                ) {
                    eprintln!("warning: failed to log status for {}: {e}", failure.source);
                }
            }

            if args.json {
                println!(
                    "{}",
                    report::json::render(&serde_json::json!({
                        "commits": commits,
                        "failures": result.failures,
                    }))
                );
            } else {
                report::print_collect(&result, &commits, args.verbose);
            }
        }
        Command::Status(args) => {
            let config = load_config(args.config.as_deref());
            let store = open_store(&config);

            match store.status_entries(args.source.as_deref(), Some(args.limit)) {
                Ok(entries) => {
                    if args.json {
                        println!("{}", report::json::render(&entries));
                    } else {
                        print!("{}", report::table::status(&entries));
                    }
                }
                Err(e) => {
                    eprintln!("Error reading status log: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::Report(args) => {
            let config = load_config(args.config.as_deref());
            let store = open_store(&config);

            let version = match args.version {
                Some(v) => v,
                None => match store.latest_ok_version(&args.source) {
                    Ok(Some(v)) => v,
                    Ok(None) => {
                        eprintln!(
                            "No successful snapshot for '{}'. Run 'muster collect' first.",
                            args.source
                        );
                        std::process::exit(1);
                    }
                    Err(e) => {
                        eprintln!("Error reading status log: {e}");
                        std::process::exit(1);
                    }
                },
            };

            let records = store.records(&args.source, version);
            let dns_domains = store.dns_domains(&args.source, version);
            let dns_records = store.dns_records(&args.source, version);

            let (records, dns_domains, dns_records) = match (records, dns_domains, dns_records) {
                (Ok(r), Ok(d), Ok(n)) => (r, d, n),
                (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
                    eprintln!("Error loading snapshot: {e}");
                    std::process::exit(1);
                }
            };

            if args.json {
                println!(
                    "{}",
                    report::json::render(&serde_json::json!({
                        "source": args.source,
                        "version": version,
                        "records": records,
                        "dns_domains": dns_domains,
                        "dns_records": dns_records,
                    }))
                );
            } else {
                if dns_domains.is_empty() && dns_records.is_empty() {
                    print!("{}", report::table::snapshot(&records));
                } else {
                    print!("{}", report::table::dns_snapshot(&dns_domains, &dns_records));
                    if !records.is_empty() {
                        print!("{}", report::table::snapshot(&records));
                    }
                }
                println!("\nsnapshot: {} version {version}", args.source);
            }
        }
        Command::Diff(args) => {
            let config = load_config(args.config.as_deref());
            let store = open_store(&config);

            // validate that --from and --to are used together
            if args.from.is_some() != args.to.is_some() {
                eprintln!("Both --from and --to must be specified together.");
                std::process::exit(1);
            }

            let (from, to) = if let (Some(from), Some(to)) = (args.from, args.to) {
                (from, to)
            } else {
                let entries = match store.status_entries(Some(&args.source), None) {
                    Ok(entries) => entries,
                    Err(e) => {
                        eprintln!("Error reading status log: {e}");
                        std::process::exit(1);
                    }
                };

                let mut ok_versions: Vec<i64> = entries
                    .iter()
                    .filter(|e| e.status == Status::Ok)
                    .map(|e| e.version)
                    .collect();
                ok_versions.sort_unstable();
                ok_versions.dedup();

                if ok_versions.len() < 2 {
                    eprintln!(
                        "Need at least 2 successful snapshots of '{}' to compare.",
                        args.source
                    );
                    std::process::exit(1);
                }

                (
                    ok_versions[ok_versions.len() - 2],
                    ok_versions[ok_versions.len() - 1],
                )
            };

            let from_records = match store.records(&args.source, from) {
                Ok(records) => records,
                Err(e) => {
                    eprintln!("Error loading version {from}: {e}");
                    std::process::exit(1);
                }
            };

            let to_records = match store.records(&args.source, to) {
                Ok(records) => records,
                Err(e) => {
                    eprintln!("Error loading version {to}: {e}");
                    std::process::exit(1);
                }
            };

            let result = diff::compare_records(&from_records, &to_records, &args.source, from, to);
            print_diff(&result);
        }
        Command::Prune(args) => {
            let config = load_config(args.config.as_deref());
            let days = args.days.unwrap_or_else(|| config.retention_days());

            if args.is_dry_run() {
                let store = open_store(&config);
                match store.expired(days) {
                    Ok(pairs) => {
                        if pairs.is_empty() {
                            println!("Nothing to prune (threshold: {days} days).");
                        } else {
                            for (source, version) in &pairs {
                                println!("[dry-run] would prune: {source} version {version}");
                            }
                            println!(
                                "\n{} snapshot(s); run with --yes to delete",
                                pairs.len()
                            );
                        }
                    }
                    Err(e) => {
                        eprintln!("Error listing expired snapshots: {e}");
                        std::process::exit(1);
                    }
                }
            } else {
                let mut store = open_store(&config);
                match store.prune(days) {
                    Ok(result) => {
                        for (source, version) in &result.snapshots {
                            println!("pruned: {source} version {version}");
                        }
                        println!(
                            "\n{} snapshot(s), {} row(s) deleted",
                            result.snapshots.len(),
                            result.rows
                        );
                    }
                    Err(e) => {
                        eprintln!("Error pruning snapshots: {e}");
                        std::process::exit(1);
                    }
                }
            }
        }
    }
}
