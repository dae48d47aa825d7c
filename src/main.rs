/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `vsh` — a small shell over an in-memory virtual filesystem, useful for
//! poking at the library by hand or from a script.

mod args;
mod config;

use std::fs;
use std::io::{self, BufRead, BufReader, Write as _};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use log::{error, info};

use args::Args;
use config::Config;
use virtfs::{
    BasePathFs, FileInfo, FileMode, MemFs, MemIdm, OpenFlags, RoFs, Vfs, WalkStep,
};

fn main() {
    let status = run();
    if let Err(ref err) = status {
        error!("{:?}", err);
    }
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    log4rs::init_file("log4rs.yml", Default::default())
        .with_context(|| "failed to init logger")?;

    let config: Config = match fs::read_to_string(&args.config_path) {
        Ok(raw) => toml::from_str(&raw).with_context(|| "failed to parse configuration")?,
        Err(_) => Config::default(),
    };

    let memfs = MemFs::with_options(&config.fs, Arc::new(MemIdm::new()))
        .with_context(|| "failed to create filesystem")?;
    let mut vfs: Box<dyn Vfs> = Box::new(memfs);
    if let Some(base) = &args.base {
        vfs.mkdir_all(base, FileMode::new(0o755))
            .with_context(|| format!("failed to create base directory '{}'", base))?;
        vfs = Box::new(
            BasePathFs::new(vfs, base)
                .with_context(|| format!("failed to rebase under '{}'", base))?,
        );
    }
    if args.read_only {
        vfs = Box::new(RoFs::new(vfs));
    }
    info!("mounted {} with features {}", vfs.fs_type(), vfs.features());

    match &args.script {
        Some(path) => {
            let file = fs::File::open(path)
                .with_context(|| format!("failed to open script '{}'", path))?;
            repl(vfs.as_ref(), BufReader::new(file), false)
        }
        None => {
            let stdin = io::stdin();
            repl(vfs.as_ref(), stdin.lock(), true)
        }
    }
}

fn repl(vfs: &dyn Vfs, reader: impl BufRead, interactive: bool) -> anyhow::Result<()> {
    if interactive {
        prompt();
    }
    for line in reader.lines() {
        let line = line.with_context(|| "failed to read input")?;
        let trimmed = line.trim();
        if !trimmed.is_empty() && !trimmed.starts_with('#') {
            match execute(vfs, trimmed) {
                Ok(true) => break,
                Ok(false) => {}
                Err(err) => eprintln!("vsh: {:#}", err),
            }
        }
        if interactive {
            prompt();
        }
    }
    Ok(())
}

fn prompt() {
    print!("vsh> ");
    let _ = io::stdout().flush();
}

/// Runs one command line; returns `true` when the shell should quit.
fn execute(vfs: &dyn Vfs, line: &str) -> anyhow::Result<bool> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some((&cmd, rest)) = parts.split_first() else {
        return Ok(false);
    };
    match cmd {
        "quit" | "exit" => return Ok(true),
        "help" => print_help(),
        "pwd" => println!("{}", vfs.getwd()?),
        "cd" => vfs.chdir(arg(rest, 0)?)?,
        "ls" => {
            let dir = rest.first().copied().unwrap_or(".");
            for entry in vfs.read_dir(dir)? {
                println!("{} {:>8} {}", entry.mode, entry.size, entry.name);
            }
        }
        "tree" => {
            let root = rest.first().copied().unwrap_or("/");
            vfs.walk(root, &mut |path, info| {
                match info {
                    Ok(info) => println!("{} {}", info.mode, path),
                    Err(err) => println!("error at {}: {}", path, err),
                }
                Ok(WalkStep::Continue)
            })?;
        }
        "mkdir" => vfs.mkdir(arg(rest, 0)?, mode_arg(rest, 1, 0o755)?)?,
        "mkdirp" => vfs.mkdir_all(arg(rest, 0)?, mode_arg(rest, 1, 0o755)?)?,
        "touch" => {
            let file = vfs.open_file(
                arg(rest, 0)?,
                OpenFlags::WRONLY | OpenFlags::CREATE,
                FileMode::new(0o666),
            )?;
            file.close()?;
        }
        "write" => {
            vfs.write_file(arg(rest, 0)?, join_text(rest, 1).as_bytes(), FileMode::new(0o644))?
        }
        "append" => {
            let file = vfs.open_file(
                arg(rest, 0)?,
                OpenFlags::WRONLY | OpenFlags::CREATE | OpenFlags::APPEND,
                FileMode::new(0o644),
            )?;
            file.write_string(&join_text(rest, 1))?;
            file.close()?;
        }
        "cat" => {
            let data = vfs.read_file(arg(rest, 0)?)?;
            io::stdout().write_all(&data)?;
            println!();
        }
        "ln" => vfs.link(arg(rest, 0)?, arg(rest, 1)?)?,
        "lns" => vfs.symlink(arg(rest, 0)?, arg(rest, 1)?)?,
        "readlink" => println!("{}", vfs.readlink(arg(rest, 0)?)?),
        "resolve" => println!("{}", vfs.eval_symlinks(arg(rest, 0)?)?),
        "mv" => vfs.rename(arg(rest, 0)?, arg(rest, 1)?)?,
        "rm" => vfs.remove(arg(rest, 0)?)?,
        "rmr" => vfs.remove_all(arg(rest, 0)?)?,
        "stat" => print_info(&vfs.stat(arg(rest, 0)?)?),
        "lstat" => print_info(&vfs.lstat(arg(rest, 0)?)?),
        "chmod" => {
            let mode = parse_mode(arg(rest, 1)?)?;
            vfs.chmod(arg(rest, 0)?, mode)?;
        }
        "chown" => {
            let uid = parse_u32(arg(rest, 1)?)?;
            let gid = parse_u32(arg(rest, 2)?)?;
            vfs.chown(arg(rest, 0)?, uid, gid)?;
        }
        "truncate" => {
            let size: i64 =
                arg(rest, 1)?.parse().with_context(|| "size must be an integer")?;
            vfs.truncate(arg(rest, 0)?, size)?;
        }
        "glob" => {
            for matched in vfs.glob(arg(rest, 0)?)? {
                println!("{}", matched);
            }
        }
        "dump" => dump(vfs, rest.first().copied().unwrap_or("/"))?,
        "umask" => match rest.first() {
            Some(mask) => vfs.set_umask(parse_mode(mask)?),
            None => println!("{:03o}", vfs.get_umask().bits()),
        },
        "user" => match rest.first() {
            Some(name) => vfs.set_user(name)?,
            None => {
                let user = vfs.current_user();
                println!("{} uid={} gid={}", user.name, user.uid, user.gid);
            }
        },
        other => bail!("unknown command '{}', try 'help'", other),
    }
    Ok(false)
}

/// Prints the subtree under `root` as JSON.
fn dump(vfs: &dyn Vfs, root: &str) -> anyhow::Result<()> {
    let mut entries = Vec::new();
    vfs.walk(root, &mut |path, info| {
        if let Ok(info) = info {
            entries.push(serde_json::json!({ "path": path, "info": info }));
        }
        Ok(WalkStep::Continue)
    })?;
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}

fn print_info(info: &FileInfo) {
    println!(
        "{} uid={} gid={} nlink={} size={} id={} {}",
        info.mode, info.uid, info.gid, info.nlink, info.size, info.file_id, info.name
    );
}

fn print_help() {
    println!(
        "commands:
  pwd | cd DIR | ls [DIR] | tree [DIR] | dump [DIR]
  mkdir PATH [MODE] | mkdirp PATH [MODE] | rm PATH | rmr PATH | mv OLD NEW
  touch PATH | write PATH TEXT.. | append PATH TEXT.. | cat PATH | truncate PATH SIZE
  ln OLD NEW | lns TARGET NEW | readlink PATH | resolve PATH
  stat PATH | lstat PATH | chmod PATH MODE | chown PATH UID GID
  umask [MODE] | user [NAME] | glob PATTERN | help | quit"
    );
}

fn arg<'a>(rest: &[&'a str], index: usize) -> anyhow::Result<&'a str> {
    rest.get(index)
        .copied()
        .with_context(|| format!("missing argument {}", index + 1))
}

fn join_text(rest: &[&str], from: usize) -> String {
    if rest.len() <= from {
        String::new()
    } else {
        rest[from..].join(" ")
    }
}

fn parse_mode(text: &str) -> anyhow::Result<FileMode> {
    let bits = u32::from_str_radix(text, 8).with_context(|| "octal mode expected")?;
    Ok(FileMode::new(bits))
}

fn mode_arg(rest: &[&str], index: usize, default: u32) -> anyhow::Result<FileMode> {
    match rest.get(index) {
        Some(text) => parse_mode(text),
        None => Ok(FileMode::new(default)),
    }
}

fn parse_u32(text: &str) -> anyhow::Result<u32> {
    text.parse().with_context(|| "numeric id expected")
}
