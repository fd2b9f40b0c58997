//! Check command implementation.
//!
//! Captures one process table snapshot with the configured source and shows
//! what the root rule would select from it.

use pstree_prof::{
    snapshot_from_raw, CaptureError, ProcessTableSource, PsSource, RootRule, Snapshot,
    SubtreeSelector,
};

use crate::config::Config;

/// Captures one snapshot and reports what the root rule selects.
pub fn command_check(
    pid: Option<u32>,
    verbose: bool,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 pstree-prof - Process Table Check");
    println!("====================================");

    let mut all_ok = true;

    println!("\n⚙️  Checking configuration...");
    let layout = match config.column_layout() {
        Ok(layout) => {
            println!("   ✅ Columns: {}", layout.ps_format());
            layout
        }
        Err(e) => {
            println!("   ❌ Invalid columns: {}", e);
            std::process::exit(1);
        }
    };
    if config.sampling_interval_ms == Some(0) {
        println!("   ❌ sampling_interval_ms must be greater than 0");
        all_ok = false;
    } else {
        println!(
            "   ✅ Sampling interval: {}ms",
            config.sampling_interval().as_millis()
        );
    }

    println!("\n📁 Capturing process table with `{}`...", config.ps_program());
    let mut source = PsSource::new(config.ps_program(), layout);
    let tree = match source
        .capture()
        .and_then(|raw| snapshot_from_raw(&raw, source.layout()).map_err(CaptureError::from))
        .map_err(|e| format!("{:#}", anyhow::Error::from(e)))
    {
        Ok(tree) => {
            println!("   ✅ Parsed {} processes", tree.len());
            tree
        }
        Err(e) => {
            println!("   ❌ {}", e);
            std::process::exit(1);
        }
    };

    let rule = match (pid, &config.pattern) {
        (Some(pid), _) => Some(RootRule::ExactPid(pid)),
        (None, Some(pattern)) => Some(RootRule::CommandContains(pattern.clone())),
        (None, None) => None,
    };

    if let Some(rule) = rule {
        println!("\n🌳 Selecting subtree for {:?}...", rule);
        let selector = SubtreeSelector::new(rule).exclude(std::process::id(), None);
        let roots = selector.roots(&tree);
        let selected = selector.select(&tree);
        if roots.is_empty() {
            println!("   ⚠️  No process matches the root rule (not an error while sampling)");
        } else {
            println!(
                "   ✅ {} root(s), {} processes selected",
                roots.len(),
                selected.len()
            );
        }
        if verbose {
            for root in roots {
                print_subtree(&selected, root, 0);
            }
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - ready to sample");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}

/// Prints `pid` and its descendants, indented by depth.
fn print_subtree(selected: &Snapshot, pid: u32, depth: usize) {
    let Some(process) = selected.get(pid) else {
        return;
    };
    println!(
        "   {}├─ {} (PID: {}, PGID: {}, user: {})",
        "│  ".repeat(depth),
        process.command,
        process.pid,
        process.process_group,
        process.owner
    );
    for child in &process.children {
        print_subtree(selected, *child, depth + 1);
    }
}
