use anyhow::Result;
use log::{debug, error, info, warn};
use std::{
    io::{BufRead, BufReader, Write},
    os::unix::net::{UnixListener, UnixStream},
    sync::mpsc::Sender,
    thread,
    time::Duration,
};

use notify::{Event, EventKind, RecursiveMode, Watcher};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use super::runtime::socket_path;
use crate::config::DaemonConfigState;
use crate::landmarks;
use crate::pipeline::{Command, ControlLoop, Published};
use crate::source::{NullSource, PoseSlot};

pub fn run_daemon() -> Result<()> {
    // socket
    let sock = socket_path();
    if sock.exists() {
        let _ = std::fs::remove_file(&sock);
    }
    let listener = UnixListener::bind(&sock)?;
    info!("daemon: listening on {}", sock.display());

    // config + control loop
    let mut cfg = DaemonConfigState::load_or_install_default()?;
    info!("daemon: active profile '{}'", cfg.active_name);
    let mut control = ControlLoop::start(cfg.profile.clone(), Box::new(NullSource));

    let (tx_req, rx_req) = std::sync::mpsc::channel::<IpcMsg>();

    // SIGINT/SIGTERM take the same exit path as the shutdown op
    let signals = Signals::new([SIGINT, SIGTERM])?;
    spawn_signal_thread(signals, tx_req.clone());

    // profile edits on disk trigger the same reload path as `handctl reload`
    let _watcher = watch_profiles(&cfg, tx_req.clone());

    // accept loop
    listener.set_nonblocking(true)?;
    loop {
        if let Ok((stream, _)) = listener.accept() {
            let ctx = ClientCtx {
                cfg: cfg.clone(),
                commands: control.commander(),
                slot: control.slot(),
                published: control.published(),
                tx_req: tx_req.clone(),
            };
            thread::spawn(move || {
                if let Err(e) = handle_client(stream, ctx) {
                    error!("ipc client error: {e}");
                }
            });
        }

        while let Ok(msg) = rx_req.try_recv() {
            match msg {
                IpcMsg::Reload => {
                    if let Err(e) = cfg.reload() {
                        error!("reload failed, keeping last good profile: {e}");
                    } else {
                        let _ = control.commander().send(Command::Reload(cfg.profile.clone()));
                        info!("profile reloaded");
                    }
                }
                IpcMsg::UseProfile(name) => {
                    if let Err(e) = cfg.set_active(&name) {
                        error!("use profile failed: {e}");
                    } else {
                        let _ = control.commander().send(Command::Reload(cfg.profile.clone()));
                        info!("switched active profile to {}", cfg.active_name);
                    }
                }
                IpcMsg::Shutdown => {
                    control.stop();
                    let _ = std::fs::remove_file(&sock);
                    info!("daemon: stopped");
                    return Ok(());
                }
            }
        }

        thread::sleep(Duration::from_millis(5));
    }
}

fn spawn_signal_thread(mut signals: Signals, tx: Sender<IpcMsg>) {
    thread::spawn(move || {
        for sig in signals.forever() {
            info!("caught signal {sig}, shutting down");
            let _ = tx.send(IpcMsg::Shutdown);
        }
    });
}

fn watch_profiles(
    cfg: &DaemonConfigState,
    tx: Sender<IpcMsg>,
) -> Option<notify::RecommendedWatcher> {
    let handler = move |res: std::result::Result<Event, notify::Error>| {
        if let Ok(ev) = res {
            if matches!(ev.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                let _ = tx.send(IpcMsg::Reload);
            }
        }
    };
    let mut watcher = match notify::recommended_watcher(handler) {
        Ok(w) => w,
        Err(e) => {
            warn!("profile watcher unavailable: {e}");
            return None;
        }
    };
    if let Err(e) = watcher.watch(&cfg.profiles_dir, RecursiveMode::NonRecursive) {
        warn!("cannot watch {}: {e}", cfg.profiles_dir.display());
        return None;
    }
    Some(watcher)
}

// Per-client handles. Everything that mutates control state goes
// through the command channel or the pose slot; handler threads never
// touch the state itself.
struct ClientCtx {
    cfg: DaemonConfigState,
    commands: Sender<Command>,
    slot: PoseSlot,
    published: Published,
    tx_req: Sender<IpcMsg>,
}

fn handle_client(mut stream: UnixStream, ctx: ClientCtx) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim().is_empty() {
        return Ok(());
    }
    let req: serde_json::Value = serde_json::from_str(&line)?;
    let op = req.get("op").and_then(|v| v.as_str()).unwrap_or("");

    let resp = match op {
        "status" => {
            let snap = ctx.published.get();
            serde_json::json!({"ok": true, "data": {
                "active_profile": ctx.cfg.active_name,
                "snapshot": snap,
            }})
        }
        "set" => match req.get("value").and_then(|v| v.as_f64()) {
            Some(v) => {
                let target = (v as f32).clamp(0.0, 1.0);
                let _ = ctx.commands.send(Command::SetTarget(target));
                serde_json::json!({"ok": true, "data": {"target": target}})
            }
            None => serde_json::json!({"ok": false, "error": "set requires a numeric 'value'"}),
        },
        "pose" => {
            let sample = match req.get("landmarks") {
                None | Some(serde_json::Value::Null) => None,
                Some(v) => match landmarks::decode_pose(v) {
                    Ok(p) => Some(p),
                    Err(e) => {
                        // malformed counts as absence for this delivery
                        debug!("dropping malformed pose: {e}");
                        None
                    }
                },
            };
            ctx.slot.publish(sample);
            serde_json::json!({"ok": true})
        }
        "reload" => {
            let _ = ctx.tx_req.send(IpcMsg::Reload);
            serde_json::json!({"ok": true, "data": {"active_profile": ctx.cfg.active_name}})
        }
        "use" => {
            let name = req.get("profile").and_then(|v| v.as_str()).unwrap_or("");
            let _ = ctx.tx_req.send(IpcMsg::UseProfile(name.to_string()));
            serde_json::json!({"ok": true, "data": {"active_profile": name}})
        }
        "list" => {
            let list = ctx.cfg.list_profiles();
            serde_json::json!({"ok": true, "data": {"profiles": list, "active": ctx.cfg.active_name}})
        }
        "doctor" => {
            let report = ctx.cfg.doctor_report();
            serde_json::json!({"ok": true, "data": report})
        }
        "shutdown" => {
            let _ = ctx.tx_req.send(IpcMsg::Shutdown);
            serde_json::json!({"ok": true, "data": "shutting down"})
        }
        _ => serde_json::json!({"ok": false, "error": format!("unknown op: {op}")}),
    };

    write!(stream, "{}\n", resp)?;
    Ok(())
}

enum IpcMsg {
    Reload,
    UseProfile(String),
    Shutdown,
}

// client helper
pub fn client_request(req: serde_json::Value) -> Result<serde_json::Value> {
    let sock = socket_path();
    if !sock.exists() {
        return Err(anyhow::anyhow!(
            "handctl daemon is not running (socket missing at {})",
            sock.display()
        ));
    }
    let mut stream = UnixStream::connect(sock)?;
    let line = serde_json::to_string(&req)? + "\n";
    stream.write_all(line.as_bytes())?;
    let mut reader = BufReader::new(stream);
    let mut resp = String::new();
    reader.read_line(&mut resp)?;
    let v: serde_json::Value = serde_json::from_str(&resp)?;
    Ok(v)
}
