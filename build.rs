// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn global_args() -> Vec<Arg> {
    vec![
        Arg::new("config")
            .short('c')
            .long("config")
            .value_name("PATH")
            .global(true)
            .help("Configuration file (TOML)"),
        Arg::new("root")
            .short('r')
            .long("root")
            .value_name("PATH")
            .global(true)
            .help("Storage root holding the update directory"),
        Arg::new("catalog")
            .long("catalog")
            .value_name("PATH")
            .global(true)
            .help("Catalog of known-good firmware sets"),
        Arg::new("console")
            .long("console")
            .value_name("PATH")
            .global(true)
            .help("Simulated console state file"),
        Arg::new("reboot_delay")
            .long("reboot-delay")
            .value_name("SECONDS")
            .global(true)
            .help("Seconds to wait before restarting after success"),
        Arg::new("quiet")
            .short('q')
            .long("quiet")
            .action(ArgAction::SetTrue)
            .global(true)
            .help("Log progress through tracing instead of drawing bars"),
    ]
}

fn build_cli() -> Command {
    Command::new("sysupdater")
        .version(env!("CARGO_PKG_VERSION"))
        .author("sysUpdater Contributors")
        .about("Offline system-title installer with catalog verification")
        .subcommand_required(false)
        .args(global_args())
        .subcommand(
            Command::new("menu")
                .about("Interactive menu: (a) update, (y) downgrade, (x) self-test, (b) exit"),
        )
        .subcommand(
            Command::new("update").about("Install every newer title from the update directory"),
        )
        .subcommand(
            Command::new("downgrade")
                .about("Replace every title whose version differs from the update directory"),
        )
        .subcommand(
            Command::new("plan")
                .about("Verify the update directory and print the install plan")
                .arg(
                    Arg::new("mode")
                        .short('m')
                        .long("mode")
                        .value_parser(["upgrade", "downgrade"])
                        .default_value("upgrade")
                        .help("Resolution mode"),
                ),
        )
        .subcommand(
            Command::new("self-test")
                .about("Check privileged package-manager access, then restart"),
        )
        .subcommand(Command::new("catalog").about("List the firmware sets in the catalog"))
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("sysupdater.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
