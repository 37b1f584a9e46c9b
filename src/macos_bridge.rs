//! AppleScript-backed control of the target application.
//!
//! Window focus, placement and search-field typing go through
//! `osascript`/System Events rather than a native API, which keeps the
//! glue dependency-free and matches how the target app is usually driven
//! by hand. Everything here is best understood as "what a user would do",
//! scripted.

use std::process::Command;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// macOS virtual key code for forward delete of the current selection.
const KEY_CODE_DELETE: u8 = 51;

fn osascript(lines: &[&str]) -> Result<String> {
    let mut cmd = Command::new("osascript");
    for line in lines {
        cmd.arg("-e").arg(line);
    }
    let output = cmd.output().context("failed to run osascript")?;
    if !output.status.success() {
        bail!(
            "osascript failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn applescript_string(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Whether the target application currently has a running process.
pub fn is_target_running(app_name: &str) -> Result<bool> {
    let processes = osascript(&[
        "tell application \"System Events\"",
        "get name of every application process",
        "end tell",
    ])?;
    Ok(processes.split(", ").any(|name| name == app_name))
}

pub fn open_target(app_name: &str) -> Result<()> {
    let status = Command::new("open")
        .arg("-a")
        .arg(app_name)
        .status()
        .context("failed to run open")?;
    if !status.success() {
        bail!("could not open {app_name}");
    }
    Ok(())
}

pub fn quit_target(app_name: &str) -> Result<()> {
    osascript(&[&format!("quit app {}", applescript_string(app_name))])?;
    Ok(())
}

/// Quit the target if running, then relaunch it, so every run starts from
/// the app's initial window state.
pub fn restart_target(app_name: &str, settle: Duration) -> Result<()> {
    if is_target_running(app_name)? {
        quit_target(app_name)?;
        thread::sleep(settle);
    }
    open_target(app_name)?;
    thread::sleep(settle);
    Ok(())
}

pub fn bring_to_foreground(app_name: &str) -> Result<()> {
    osascript(&[&format!(
        "tell application {} to activate",
        applescript_string(app_name)
    )])?;
    Ok(())
}

pub fn move_window_to(app_name: &str, x: i32, y: i32) -> Result<()> {
    osascript(&[
        "tell application \"System Events\"",
        &format!("tell process {}", applescript_string(app_name)),
        &format!("set position of window 1 to {{{x}, {y}}}"),
        "end tell",
        "end tell",
    ])?;
    Ok(())
}

pub fn maximize_window(app_name: &str) -> Result<()> {
    osascript(&[
        "tell application \"System Events\"",
        &format!("tell process {}", applescript_string(app_name)),
        "if exists window 1 then",
        "set frontmost to true",
        "set value of attribute \"AXFullScreen\" of window 1 to true",
        "end if",
        "end tell",
        "end tell",
    ])?;
    Ok(())
}

/// Native informational dialog with a single OK button.
pub fn show_dialog(title: &str, message: &str) -> Result<()> {
    osascript(&[&format!(
        "display dialog {} with title {} buttons {{\"OK\"}} default button \"OK\"",
        applescript_string(message),
        applescript_string(title)
    )])?;
    Ok(())
}

/// Clear the target's global search field and type `term` into it.
///
/// Focuses the field with Cmd-F, selects and deletes any previous query,
/// then pastes the term from the clipboard (typing via paste sidesteps
/// per-keystroke IME handling mangling the text).
pub fn type_into_search_field(app_name: &str, term: &str) -> Result<()> {
    bring_to_foreground(app_name)?;
    thread::sleep(Duration::from_millis(2000));

    send_shortcut("f")?;
    send_shortcut("a")?;
    send_key_code(KEY_CODE_DELETE)?;

    let mut clipboard = arboard::Clipboard::new().context("clipboard unavailable")?;
    clipboard
        .set_text(term.to_string())
        .context("could not stage the search term on the clipboard")?;
    thread::sleep(Duration::from_millis(500));

    // Re-focus before pasting in case the delete dropped field focus.
    send_shortcut("f")?;
    send_shortcut("v")?;
    thread::sleep(Duration::from_millis(500));
    Ok(())
}

fn send_shortcut(key: &str) -> Result<()> {
    osascript(&[
        "tell application \"System Events\"",
        &format!("keystroke \"{key}\" using command down"),
        "end tell",
    ])?;
    Ok(())
}

fn send_key_code(code: u8) -> Result<()> {
    osascript(&[
        "tell application \"System Events\"",
        &format!("key code {code}"),
        "end tell",
    ])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applescript_strings_are_escaped() {
        assert_eq!(applescript_string("plain"), "\"plain\"");
        assert_eq!(
            applescript_string("say \"hi\""),
            "\"say \\\"hi\\\"\""
        );
        assert_eq!(applescript_string("back\\slash"), "\"back\\\\slash\"");
    }
}
