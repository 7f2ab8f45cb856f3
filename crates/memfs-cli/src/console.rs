//! Command interpreter.
//!
//! One line in, one reply out. Open files are tracked by small integer
//! handle numbers the way a kernel transport tracks `fh` values.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result, anyhow};
use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};
use tracing::debug;

use memfs_kernel::{CallerContext, FileAttr, FileHandle, FsOps, MemFs, StatFs};

/// Console commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Command {
    Mkdir,
    Mknod,
    Rmdir,
    Unlink,
    Link,
    Mv,
    Stat,
    Ls,
    Open,
    Close,
    Read,
    Write,
    Truncate,
    Chmod,
    Chown,
    Touch,
    As,
    Statfs,
    Help,
    #[strum(serialize = "quit", serialize = "exit")]
    Quit,
}

impl Command {
    fn usage(self) -> &'static str {
        match self {
            Command::Mkdir => "mkdir PATH [MODE]",
            Command::Mknod => "mknod PATH [MODE]",
            Command::Rmdir => "rmdir PATH",
            Command::Unlink => "unlink PATH",
            Command::Link => "link PATH NEWPATH",
            Command::Mv => "mv OLDPATH NEWPATH",
            Command::Stat => "stat PATH",
            Command::Ls => "ls PATH",
            Command::Open => "open PATH",
            Command::Close => "close FH",
            Command::Read => "read FH SIZE OFFSET",
            Command::Write => "write FH OFFSET TEXT",
            Command::Truncate => "truncate PATH SIZE",
            Command::Chmod => "chmod MODE PATH",
            Command::Chown => "chown UID|- GID|- PATH",
            Command::Touch => "touch PATH",
            Command::As => "as UID GID",
            Command::Statfs => "statfs",
            Command::Help => "help",
            Command::Quit => "quit",
        }
    }
}

/// What the caller should do after a command.
#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    /// Print this and keep going. May be empty.
    Output(String),
    Quit,
}

/// Interactive state: the filesystem, the current identity and the open
/// files.
pub struct Console {
    fs: MemFs,
    ctx: CallerContext,
    files: HashMap<u64, FileHandle>,
    next_fh: u64,
}

impl Console {
    pub fn new(fs: MemFs, ctx: CallerContext) -> Self {
        Self {
            fs,
            ctx,
            files: HashMap::new(),
            next_fh: 1,
        }
    }

    pub fn ctx(&self) -> CallerContext {
        self.ctx
    }

    /// Run one line. Blank lines and `#` comments do nothing.
    pub fn execute(&mut self, line: &str) -> Result<Reply> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(Reply::Output(String::new()));
        }
        let (name, rest) = line
            .split_once(char::is_whitespace)
            .unwrap_or((line, ""));
        let command: Command = name
            .parse()
            .map_err(|_| anyhow!("unknown command: {name} (try `help`)"))?;
        debug!(?command, rest, "executing");

        let mut args = Args::new(command, rest);
        let ctx = self.ctx;
        let out = match command {
            Command::Mkdir => {
                let path = args.next()?;
                let mode = args.mode_or(0o777)?;
                args.finish()?;
                format_attr(&self.fs.mkdir(&ctx, path, mode)?)
            }
            Command::Mknod => {
                let path = args.next()?;
                let mode = args.mode_or(0o666)?;
                args.finish()?;
                format_attr(&self.fs.mknod(&ctx, path, mode)?)
            }
            Command::Rmdir => {
                let path = args.last()?;
                self.fs.rmdir(&ctx, path)?;
                String::new()
            }
            Command::Unlink => {
                let path = args.last()?;
                self.fs.unlink(&ctx, path)?;
                String::new()
            }
            Command::Link => {
                let path = args.next()?;
                let newpath = args.last()?;
                format_attr(&self.fs.link(&ctx, path, newpath)?)
            }
            Command::Mv => {
                let oldpath = args.next()?;
                let newpath = args.last()?;
                self.fs.rename(&ctx, oldpath, newpath)?;
                String::new()
            }
            Command::Stat => format_attr(&self.fs.getattr(&ctx, args.last()?)?),
            Command::Ls => {
                let dir = self.fs.opendir(&ctx, args.last()?)?;
                let mut out = String::new();
                for entry in dir.readdir()? {
                    let kind = if entry.kind.is_dir() { 'd' } else { '-' };
                    let _ = writeln!(out, "{:>6} {kind} {}", entry.ino, entry.name);
                }
                out
            }
            Command::Open => {
                let handle = self.fs.open(&ctx, args.last()?)?;
                let fh = self.next_fh;
                self.next_fh += 1;
                self.files.insert(fh, handle);
                format!("fh {fh}\n")
            }
            Command::Close => {
                let fh = args.number::<u64>("FH")?;
                args.finish()?;
                let handle = self
                    .files
                    .remove(&fh)
                    .ok_or_else(|| anyhow!("no open file handle {fh}"))?;
                handle.close();
                String::new()
            }
            Command::Read => {
                let fh = args.number::<u64>("FH")?;
                let size = args.number::<usize>("SIZE")?;
                let offset = args.number::<u64>("OFFSET")?;
                args.finish()?;
                let bytes = self.handle(fh)?.read(size, offset)?;
                let mut out = String::from_utf8_lossy(&bytes).into_owned();
                out.push('\n');
                out
            }
            Command::Write => {
                let fh = args.number::<u64>("FH")?;
                let offset = args.number::<u64>("OFFSET")?;
                let text = args.rest();
                let written = self.handle(fh)?.write(text.as_bytes(), offset)?;
                format!("wrote {written}\n")
            }
            Command::Truncate => {
                let path = args.next()?;
                let size = args.number::<u64>("SIZE")?;
                args.finish()?;
                self.fs.truncate(&ctx, path, size)?;
                String::new()
            }
            Command::Chmod => {
                let mode = parse_mode(args.next()?)?;
                let path = args.last()?;
                format_attr(&self.fs.chmod(&ctx, path, mode)?)
            }
            Command::Chown => {
                let uid = parse_id(args.next()?)?;
                let gid = parse_id(args.next()?)?;
                let path = args.last()?;
                format_attr(&self.fs.chown(&ctx, path, uid, gid)?)
            }
            Command::Touch => {
                let path = args.last()?;
                if self.fs.exists(&ctx, path) {
                    self.fs.utimens(&ctx, path, None)?;
                } else {
                    self.fs.mknod(&ctx, path, 0o666)?;
                }
                String::new()
            }
            Command::As => {
                let uid = args.number::<u32>("UID")?;
                let gid = args.number::<u32>("GID")?;
                args.finish()?;
                self.ctx = CallerContext::new(uid, gid).with_umask(self.ctx.umask);
                format!("now uid={uid} gid={gid}\n")
            }
            Command::Statfs => {
                args.finish()?;
                format_statfs(&self.fs.statfs()?)
            }
            Command::Help => help(),
            Command::Quit => return Ok(Reply::Quit),
        };
        Ok(Reply::Output(out))
    }

    fn handle(&self, fh: u64) -> Result<&FileHandle> {
        self.files
            .get(&fh)
            .ok_or_else(|| anyhow!("no open file handle {fh}"))
    }
}

/// Whitespace-separated arguments of one command.
struct Args<'a> {
    command: Command,
    rest: &'a str,
}

impl<'a> Args<'a> {
    fn new(command: Command, rest: &'a str) -> Self {
        Self { command, rest }
    }

    fn usage_error(&self) -> anyhow::Error {
        anyhow!("usage: {}", self.command.usage())
    }

    fn next(&mut self) -> Result<&'a str> {
        let rest = self.rest.trim_start();
        if rest.is_empty() {
            return Err(self.usage_error());
        }
        let (arg, tail) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        self.rest = tail;
        Ok(arg)
    }

    /// Next argument, which must also be the final one.
    fn last(&mut self) -> Result<&'a str> {
        let arg = self.next()?;
        self.finish()?;
        Ok(arg)
    }

    fn number<T: std::str::FromStr>(&mut self, what: &str) -> Result<T> {
        let arg = self.next()?;
        arg.parse()
            .map_err(|_| anyhow!("{what} must be a number, got {arg:?}"))
    }

    fn mode_or(&mut self, default: u32) -> Result<u32> {
        if self.rest.trim().is_empty() {
            Ok(default)
        } else {
            parse_mode(self.next()?)
        }
    }

    /// Everything left, with the separating whitespace removed.
    fn rest(&mut self) -> &'a str {
        let rest = self.rest.strip_prefix(char::is_whitespace).unwrap_or(self.rest);
        self.rest = "";
        rest
    }

    fn finish(&self) -> Result<()> {
        if self.rest.trim().is_empty() {
            Ok(())
        } else {
            Err(self.usage_error())
        }
    }
}

/// Octal mode, with or without a `0o` prefix.
pub fn parse_mode(s: &str) -> Result<u32> {
    let digits = s.strip_prefix("0o").unwrap_or(s);
    u32::from_str_radix(digits, 8).with_context(|| format!("invalid octal mode {s:?}"))
}

/// Numeric id, or `-` for unchanged.
fn parse_id(s: &str) -> Result<Option<u32>> {
    if s == "-" {
        return Ok(None);
    }
    s.parse()
        .map(Some)
        .with_context(|| format!("invalid id {s:?}"))
}

fn format_attr(attr: &FileAttr) -> String {
    let secs = |t: std::time::SystemTime| {
        t.duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    };
    let kind = if attr.is_dir() { "dir" } else { "file" };
    format!(
        "ino={} {kind} mode={:o} nlink={} uid={} gid={} size={} atime={} mtime={} ctime={}\n",
        attr.ino,
        attr.mode,
        attr.nlink,
        attr.uid,
        attr.gid,
        attr.size,
        secs(attr.atime),
        secs(attr.mtime),
        secs(attr.ctime),
    )
}

fn format_statfs(st: &StatFs) -> String {
    format!(
        "bsize={} blocks={} bfree={} files={} ffree={} namelen={}\n",
        st.bsize, st.blocks, st.bfree, st.files, st.ffree, st.namelen
    )
}

fn help() -> String {
    let mut out = String::from("commands:\n");
    for command in Command::iter() {
        let _ = writeln!(out, "  {}", command.usage());
    }
    out
}

/// Errno for an error that came from the filesystem.
#[cfg(unix)]
pub fn errno_of(err: &anyhow::Error) -> Option<i32> {
    err.downcast_ref::<memfs_kernel::FsError>().map(|e| e.errno())
}

#[cfg(not(unix))]
pub fn errno_of(_err: &anyhow::Error) -> Option<i32> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn console() -> Console {
        Console::new(MemFs::default(), CallerContext::root())
    }

    fn output(console: &mut Console, line: &str) -> String {
        match console.execute(line).unwrap() {
            Reply::Output(out) => out,
            Reply::Quit => panic!("unexpected quit on {line:?}"),
        }
    }

    #[test]
    fn test_command_names() {
        assert_eq!("mkdir".parse::<Command>().unwrap(), Command::Mkdir);
        assert_eq!("as".parse::<Command>().unwrap(), Command::As);
        assert_eq!("exit".parse::<Command>().unwrap(), Command::Quit);
        assert!("frobnicate".parse::<Command>().is_err());
        let name: &'static str = Command::Statfs.into();
        assert_eq!(name, "statfs");
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("755").unwrap(), 0o755);
        assert_eq!(parse_mode("0o640").unwrap(), 0o640);
        assert!(parse_mode("9").is_err());
    }

    #[test]
    fn test_open_write_read_close() {
        let mut c = console();
        output(&mut c, "mknod /f 644");
        assert_eq!(output(&mut c, "open /f"), "fh 1\n");
        assert_eq!(output(&mut c, "write 1 0 hello there"), "wrote 11\n");
        assert_eq!(output(&mut c, "read 1 5 6"), "there\n");
        output(&mut c, "close 1");
        assert!(c.execute("read 1 5 0").is_err());
    }

    #[test]
    fn test_ls_lists_entries() {
        let mut c = console();
        output(&mut c, "mkdir /d");
        output(&mut c, "touch /d/x");
        let listing = output(&mut c, "ls /d");
        let names: Vec<&str> = listing
            .lines()
            .map(|l| l.rsplit(' ').next().unwrap())
            .collect();
        assert_eq!(names, [".", "..", "x"]);
    }

    #[test]
    fn test_errors_carry_errno() {
        let mut c = console();
        output(&mut c, "mkdir /d");
        let err = c.execute("mkdir /d").unwrap_err();
        #[cfg(unix)]
        assert_eq!(errno_of(&err), Some(17));

        let err = c.execute("bogus").unwrap_err();
        assert_eq!(errno_of(&err), None);
    }

    #[test]
    fn test_usage_errors() {
        let mut c = console();
        let err = c.execute("mv /a").unwrap_err();
        assert!(err.to_string().starts_with("usage: mv"));
        assert!(c.execute("stat / extra").is_err());
    }

    #[test]
    fn test_switch_identity() {
        let mut c = console();
        output(&mut c, "mkdir /private 700");
        output(&mut c, "as 1000 1000");
        assert_eq!(c.ctx().uid, 1000);
        assert!(c.execute("stat /private/x").is_err());
        assert!(c.execute("chown 5 - /private").is_err());
    }

    #[test]
    fn test_chown_dash_keeps_field() {
        let mut c = console();
        output(&mut c, "mknod /f");
        let out = output(&mut c, "chown 42 - /f");
        assert!(out.contains("uid=42 gid=0"));
    }

    #[test]
    fn test_comments_and_quit() {
        let mut c = console();
        assert_eq!(c.execute("# nothing").unwrap(), Reply::Output(String::new()));
        assert_eq!(c.execute("quit").unwrap(), Reply::Quit);
    }

    #[test]
    fn test_help_lists_every_command() {
        let out = help();
        assert_eq!(out.lines().count(), Command::iter().count() + 1);
    }
}
