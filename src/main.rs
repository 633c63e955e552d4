use clap::Parser;

use masonry::fs::StdFs;
use masonry::introspect;
use masonry::workspace::options::OptionOverride;
use masonry::Workspace;

#[derive(Parser)]
#[command(name = "masonry")]
#[command(about = "Configure a build from meson.build descriptions")]
#[command(version)]
struct Cli {
    /// Source directory containing the root meson.build
    #[arg(default_value = ".")]
    source_dir: String,

    /// Build directory to configure into
    #[arg(default_value = "build")]
    build_dir: String,

    /// Option overrides in [subproject:]key=value form
    #[arg(short = 'D', value_name = "option")]
    defines: Vec<String>,

    /// Print the post-evaluation state as JSON
    #[arg(long)]
    introspect: bool,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();

    let mut overrides = Vec::new();
    for define in &cli.defines {
        match OptionOverride::parse(define) {
            Ok(oo) => overrides.push(oo),
            Err(message) => {
                eprintln!("error: {}", message);
                std::process::exit(2);
            }
        }
    }

    let source_root = match std::fs::canonicalize(&cli.source_dir) {
        Ok(path) => path.to_string_lossy().to_string(),
        Err(e) => {
            eprintln!("error: cannot open source directory '{}': {}", cli.source_dir, e);
            std::process::exit(2);
        }
    };

    let mut wk = Workspace::new(Box::new(StdFs::new()), &source_root, &cli.build_dir);
    wk.diag.echo = !cli.quiet && !cli.introspect;
    wk.option_overrides = overrides;

    match wk.eval_root() {
        Ok(()) => {
            if cli.introspect {
                let snapshot = introspect::collect(&wk);
                match serde_json::to_string_pretty(&snapshot) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("error: failed to serialize introspection data: {}", e);
                        std::process::exit(1);
                    }
                }
            } else if !cli.quiet {
                for project in &wk.projects {
                    for (section, entries) in &project.summary {
                        if section.is_empty() {
                            println!("{}", project.name);
                        } else {
                            println!("{} {}", project.name, section);
                        }
                        for (key, value) in entries {
                            println!("  {}: {}", key, wk.store.render_plain(*value));
                        }
                    }
                }
                let snapshot = introspect::collect(&wk);
                println!(
                    "Configured {} target(s), {} test(s), {} option(s)",
                    snapshot.targets.len(),
                    snapshot.tests.len(),
                    snapshot.options.len()
                );
                if wk.diag.warning_count > 0 {
                    println!("{} warning(s)", wk.diag.warning_count);
                }
            }
            std::process::exit(0);
        }
        Err(err) => {
            eprintln!("{}", wk.diag.render(&err));
            std::process::exit(1);
        }
    }
}
