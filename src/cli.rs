use anyhow::{Result, anyhow};
use pico_args::Arguments;
use std::{env, process::Command};

use crate::ipc;

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // Hidden daemon mode (spawned by `start`)
    if pargs.contains("--daemon") {
        return ipc::run_daemon();
    }

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("start") => {
            let exe = std::env::current_exe()?;
            let child = Command::new(exe).arg("--daemon").spawn()?;
            println!("handctl: started daemon (pid={})", child.id());
            Ok(())
        }

        Some("stop") => {
            let r = ipc::client_request(serde_json::json!({"op":"shutdown"}))?;
            print_response(&r);
            Ok(())
        }

        Some("status") => {
            let r = ipc::client_request(serde_json::json!({"op":"status"}))?;
            print_response(&r);
            Ok(())
        }

        Some("set") => {
            let value: f32 = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handctl set <0..1>"))?;
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("target must be in [0,1], got {value}"));
            }
            let r = ipc::client_request(serde_json::json!({"op":"set","value":value}))?;
            print_response(&r);
            Ok(())
        }

        Some("pose") => {
            // usage:
            //   handctl pose '[{"x":0.5,"y":0.5}, ...]'   deliver a sample
            //   handctl pose none                         deliver an absence
            let payload: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handctl pose <json-landmarks|none>"))?;
            let landmarks = if payload == "none" {
                serde_json::Value::Null
            } else {
                serde_json::from_str(&payload)
                    .map_err(|e| anyhow!("landmarks must be a JSON array: {e}"))?
            };
            let r = ipc::client_request(serde_json::json!({"op":"pose","landmarks":landmarks}))?;
            print_response(&r);
            Ok(())
        }

        Some("reload") => {
            let r = ipc::client_request(serde_json::json!({"op":"reload"}))?;
            print_response(&r);
            Ok(())
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handctl use <profile_name>"))?;
            let r = ipc::client_request(serde_json::json!({"op":"use","profile":name}))?;
            print_response(&r);
            Ok(())
        }

        Some("list") => {
            let r = ipc::client_request(serde_json::json!({"op":"list"}))?;
            print_response(&r);
            Ok(())
        }

        Some("doctor") => {
            let r = ipc::client_request(serde_json::json!({"op":"doctor"}))?;
            print_response(&r);
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!(
        r#"handctl — hand-gesture progress control daemon

USAGE:
  handctl help [command]              Show general or command-specific help
  handctl start                       Start the daemon
  handctl stop                        Stop the daemon
  handctl status                      Show the current control snapshot
  handctl set <0..1>                  Manually override the progress target
  handctl pose <json|none>            Deliver a landmark sample (or absence)
  handctl reload                      Reload the active profile
  handctl use <name>                  Switch active profile
  handctl list                        List profiles
  handctl doctor                      Show config paths and effective settings

TIPS:
  - Profiles: ~/.config/handctl/profiles
  - Active profile pointer: ~/.config/handctl/active
  - The vision engine feeds poses through the same socket as `handctl pose`
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "start" => println!("usage: handctl start\nStarts the background daemon."),
        "stop" => println!("usage: handctl stop\nStops the running daemon."),
        "status" => println!(
            "usage: handctl status\nShows the published snapshot: target, per-channel progress, rotation, presence, label."
        ),
        "set" => println!(
            "usage: handctl set <0..1>\nOverrides the progress target directly, bypassing gesture classification."
        ),
        "pose" => println!(
            "usage:\n  handctl pose '[{{\"x\":0.5,\"y\":0.5}}, ...21 points]'\n  handctl pose none\nDelivers one landmark sample; 'none' reports that no hand is visible."
        ),
        "reload" => println!(
            "usage: handctl reload\nReloads the current profile; keeps last good on error."
        ),
        "use" => {
            println!("usage: handctl use <name>\nSwitches active profile to <name> and reloads.")
        }
        "list" => println!("usage: handctl list\nLists available profiles."),
        "doctor" => println!(
            "usage: handctl doctor\nShows config locations, thresholds, and tick rate."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
