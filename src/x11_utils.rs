//! X11 window property probe for the active window

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;

use crate::constants::{desktop, window_type};
use crate::probe::WindowPropertyProbe;
use crate::rules::PropertyBag;

fn intern(conn: &RustConnection, name: &str) -> Result<Atom> {
    Ok(conn
        .intern_atom(false, name.as_bytes())
        .with_context(|| format!("Failed to intern {} atom", name))?
        .reply()
        .with_context(|| format!("Failed to get reply for {} atom", name))?
        .atom)
}

/// EWMH/KDE window type atoms in the order window type ids are assigned
const WINDOW_TYPE_ATOMS: &[(&str, i64)] = &[
    ("_NET_WM_WINDOW_TYPE_NORMAL", window_type::NORMAL),
    ("_NET_WM_WINDOW_TYPE_DESKTOP", window_type::DESKTOP),
    ("_NET_WM_WINDOW_TYPE_DOCK", window_type::DOCK),
    ("_NET_WM_WINDOW_TYPE_TOOLBAR", window_type::TOOLBAR),
    ("_NET_WM_WINDOW_TYPE_MENU", window_type::MENU),
    ("_NET_WM_WINDOW_TYPE_DIALOG", window_type::DIALOG),
    ("_KDE_NET_WM_WINDOW_TYPE_OVERRIDE", window_type::OVERRIDE),
    ("_KDE_NET_WM_WINDOW_TYPE_TOPMENU", window_type::TOP_MENU),
    ("_NET_WM_WINDOW_TYPE_UTILITY", window_type::UTILITY),
    ("_NET_WM_WINDOW_TYPE_SPLASH", window_type::SPLASH),
];

/// Pre-cached X11 atoms, interned once per probe
pub struct CachedAtoms {
    pub utf8_string: Atom,
    pub net_wm_name: Atom,
    pub wm_window_role: Atom,
    pub net_wm_window_type: Atom,
    pub net_wm_state: Atom,
    pub net_wm_desktop: Atom,
    pub net_active_window: Atom,
    pub kde_desktop_file: Atom,
    pub window_types: Vec<(Atom, i64)>,
    pub states: WindowStateAtoms,
}

pub struct WindowStateAtoms {
    pub maximized_horz: Atom,
    pub maximized_vert: Atom,
    pub hidden: Atom,
    pub shaded: Atom,
    pub fullscreen: Atom,
    pub above: Atom,
    pub below: Atom,
    pub skip_taskbar: Atom,
    pub skip_pager: Atom,
    pub skip_switcher: Atom,
}

impl CachedAtoms {
    pub fn new(conn: &RustConnection) -> Result<Self> {
        let window_types = WINDOW_TYPE_ATOMS
            .iter()
            .map(|(name, id)| Ok((intern(conn, name)?, *id)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            utf8_string: intern(conn, "UTF8_STRING")?,
            net_wm_name: intern(conn, "_NET_WM_NAME")?,
            wm_window_role: intern(conn, "WM_WINDOW_ROLE")?,
            net_wm_window_type: intern(conn, "_NET_WM_WINDOW_TYPE")?,
            net_wm_state: intern(conn, "_NET_WM_STATE")?,
            net_wm_desktop: intern(conn, "_NET_WM_DESKTOP")?,
            net_active_window: intern(conn, "_NET_ACTIVE_WINDOW")?,
            kde_desktop_file: intern(conn, "_KDE_NET_WM_DESKTOP_FILE")?,
            window_types,
            states: WindowStateAtoms {
                maximized_horz: intern(conn, "_NET_WM_STATE_MAXIMIZED_HORZ")?,
                maximized_vert: intern(conn, "_NET_WM_STATE_MAXIMIZED_VERT")?,
                hidden: intern(conn, "_NET_WM_STATE_HIDDEN")?,
                shaded: intern(conn, "_NET_WM_STATE_SHADED")?,
                fullscreen: intern(conn, "_NET_WM_STATE_FULLSCREEN")?,
                above: intern(conn, "_NET_WM_STATE_ABOVE")?,
                below: intern(conn, "_NET_WM_STATE_BELOW")?,
                skip_taskbar: intern(conn, "_NET_WM_STATE_SKIP_TASKBAR")?,
                skip_pager: intern(conn, "_NET_WM_STATE_SKIP_PAGER")?,
                skip_switcher: intern(conn, "_KDE_NET_WM_STATE_SKIP_SWITCHER")?,
            },
        })
    }
}

/// Properties of one window, serialized with the property-bag key names
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSnapshot {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub resource_name: String,
    pub resource_class: String,
    pub caption: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_machine: Option<String>,
    #[serde(rename = "type")]
    pub window_type: i64,
    pub x11_desktop_number: i64,
    pub maximize_horizontal: bool,
    pub maximize_vertical: bool,
    pub minimized: bool,
    pub shaded: bool,
    pub fullscreen: bool,
    pub keep_above: bool,
    pub keep_below: bool,
    pub skip_taskbar: bool,
    pub skip_pager: bool,
    pub skip_switcher: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desktop_file: Option<String>,
}

impl WindowSnapshot {
    pub fn into_bag(self) -> Result<PropertyBag> {
        match serde_json::to_value(self).context("Failed to serialize window snapshot")? {
            serde_json::Value::Object(bag) => Ok(bag),
            other => anyhow::bail!("Window snapshot serialized to a non-object: {}", other),
        }
    }
}

/// Split a WM_CLASS value into (instance, class)
pub fn parse_wm_class(raw: &[u8]) -> (String, String) {
    let mut parts = raw
        .split(|b| *b == 0)
        .map(|part| String::from_utf8_lossy(part).into_owned());
    let name = parts.next().unwrap_or_default();
    let class = parts.next().unwrap_or_default();
    (name, class)
}

/// First recognised entry of a `_NET_WM_WINDOW_TYPE` list
pub fn window_type_from_atoms(types: &[Atom], known: &[(Atom, i64)]) -> i64 {
    types
        .iter()
        .find_map(|atom| known.iter().find(|(candidate, _)| candidate == atom).map(|(_, id)| *id))
        .unwrap_or(window_type::UNKNOWN)
}

/// `_NET_WM_DESKTOP` is 0-based with 0xFFFFFFFF for sticky windows
pub fn desktop_number(raw: Option<u32>) -> i64 {
    match raw {
        Some(u32::MAX) => desktop::ON_ALL_DESKTOPS,
        Some(index) => index as i64 + 1,
        None => desktop::ON_ALL_DESKTOPS,
    }
}

fn property_bytes(conn: &RustConnection, window: Window, atom: Atom, type_: impl Into<Atom>) -> Result<Vec<u8>> {
    Ok(conn
        .get_property(false, window, atom, type_, 0, 1024)
        .with_context(|| format!("Failed to query property {} for window {}", atom, window))?
        .reply()
        .with_context(|| format!("Failed to get property {} reply for window {}", atom, window))?
        .value)
}

fn property_text(conn: &RustConnection, window: Window, atom: Atom, type_: impl Into<Atom>) -> Result<Option<String>> {
    let bytes = property_bytes(conn, window, atom, type_)?;
    let text = String::from_utf8_lossy(&bytes).trim_end_matches('\0').to_string();
    Ok((!text.is_empty()).then_some(text))
}

fn property_u32s(conn: &RustConnection, window: Window, atom: Atom, type_: impl Into<Atom>) -> Result<Vec<u32>> {
    let reply = conn
        .get_property(false, window, atom, type_, 0, 1024)
        .with_context(|| format!("Failed to query property {} for window {}", atom, window))?
        .reply()
        .with_context(|| format!("Failed to get property {} reply for window {}", atom, window))?;
    Ok(reply.value32().map(|values| values.collect()).unwrap_or_default())
}

fn active_window(conn: &RustConnection, root: Window, atoms: &CachedAtoms) -> Result<Window> {
    let active = property_u32s(conn, root, atoms.net_active_window, AtomEnum::WINDOW)
        .context("Failed to read _NET_ACTIVE_WINDOW")?;
    match active.first() {
        Some(&window) if window != x11rb::NONE => Ok(window),
        _ => anyhow::bail!("No active window reported by the window manager"),
    }
}

pub fn read_window(conn: &RustConnection, root: Window, atoms: &CachedAtoms, window: Window) -> Result<WindowSnapshot> {
    let geometry = conn
        .get_geometry(window)
        .context(format!("Failed to query geometry for window {}", window))?
        .reply()
        .context(format!("Failed to get geometry reply for window {}", window))?;
    let origin = conn
        .translate_coordinates(window, root, 0, 0)
        .context(format!("Failed to translate coordinates for window {}", window))?
        .reply()
        .context(format!("Failed to get coordinate reply for window {}", window))?;

    let (resource_name, resource_class) =
        parse_wm_class(&property_bytes(conn, window, AtomEnum::WM_CLASS.into(), AtomEnum::STRING)?);

    let caption = match property_text(conn, window, atoms.net_wm_name, atoms.utf8_string)? {
        Some(caption) => caption,
        None => property_text(conn, window, AtomEnum::WM_NAME.into(), AtomEnum::ANY)?.unwrap_or_default(),
    };

    let types = property_u32s(conn, window, atoms.net_wm_window_type, AtomEnum::ATOM)?;
    let state = property_u32s(conn, window, atoms.net_wm_state, AtomEnum::ATOM)?;
    let has = |atom: Atom| state.contains(&atom);
    let desktop = property_u32s(conn, window, atoms.net_wm_desktop, AtomEnum::CARDINAL)?;

    let snapshot = WindowSnapshot {
        x: origin.dst_x as i32,
        y: origin.dst_y as i32,
        width: geometry.width as u32,
        height: geometry.height as u32,
        resource_name,
        resource_class,
        caption,
        role: property_text(conn, window, atoms.wm_window_role, AtomEnum::STRING)?,
        client_machine: property_text(conn, window, AtomEnum::WM_CLIENT_MACHINE.into(), AtomEnum::STRING)?,
        window_type: window_type_from_atoms(&types, &atoms.window_types),
        x11_desktop_number: desktop_number(desktop.first().copied()),
        maximize_horizontal: has(atoms.states.maximized_horz),
        maximize_vertical: has(atoms.states.maximized_vert),
        minimized: has(atoms.states.hidden),
        shaded: has(atoms.states.shaded),
        fullscreen: has(atoms.states.fullscreen),
        keep_above: has(atoms.states.above),
        keep_below: has(atoms.states.below),
        skip_taskbar: has(atoms.states.skip_taskbar),
        skip_pager: has(atoms.states.skip_pager),
        skip_switcher: has(atoms.states.skip_switcher),
        desktop_file: property_text(conn, window, atoms.kde_desktop_file, atoms.utf8_string)?,
    };
    debug!(window, class = %snapshot.resource_class, caption = %snapshot.caption, "Read window properties");
    Ok(snapshot)
}

/// Queries the window manager's active window over a fresh X11 connection
#[derive(Debug, Clone, Default)]
pub struct X11Probe {
    /// Display name; `None` uses `$DISPLAY`
    pub display: Option<String>,
}

impl WindowPropertyProbe for X11Probe {
    fn query_window_info(&self) -> Result<PropertyBag> {
        let (conn, screen_num) =
            x11rb::connect(self.display.as_deref()).context("Failed to connect to the X11 server")?;
        let root = conn.setup().roots[screen_num].root;
        let atoms = CachedAtoms::new(&conn)?;

        let window = active_window(&conn, root, &atoms)?;
        read_window(&conn, root, &atoms, window)?.into_bag()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_wm_class() {
        assert_eq!(parse_wm_class(b"navigator\0firefox\0"), ("navigator".into(), "firefox".into()));
        assert_eq!(parse_wm_class(b"xterm"), ("xterm".into(), String::new()));
        assert_eq!(parse_wm_class(b""), (String::new(), String::new()));
    }

    #[test]
    fn test_window_type_from_atoms() {
        let known = [(100, window_type::NORMAL), (105, window_type::DIALOG), (108, window_type::UTILITY)];
        assert_eq!(window_type_from_atoms(&[105, 100], &known), window_type::DIALOG);
        assert_eq!(window_type_from_atoms(&[999, 108], &known), window_type::UTILITY);
        assert_eq!(window_type_from_atoms(&[], &known), window_type::UNKNOWN);
    }

    #[test]
    fn test_desktop_number() {
        assert_eq!(desktop_number(Some(0)), 1);
        assert_eq!(desktop_number(Some(3)), 4);
        assert_eq!(desktop_number(Some(u32::MAX)), desktop::ON_ALL_DESKTOPS);
        assert_eq!(desktop_number(None), desktop::ON_ALL_DESKTOPS);
    }

    #[test]
    fn test_snapshot_bag_keys() {
        let snapshot = WindowSnapshot {
            x: 5,
            resource_class: "kate".into(),
            window_type: window_type::DIALOG,
            x11_desktop_number: 2,
            keep_above: true,
            ..Default::default()
        };
        let bag = snapshot.into_bag().unwrap();

        assert_eq!(bag.get("x"), Some(&json!(5)));
        assert_eq!(bag.get("resourceClass"), Some(&json!("kate")));
        assert_eq!(bag.get("type"), Some(&json!(5)));
        assert_eq!(bag.get("x11DesktopNumber"), Some(&json!(2)));
        assert_eq!(bag.get("keepAbove"), Some(&json!(true)));
        assert!(!bag.contains_key("role"));
        assert!(!bag.contains_key("desktopFile"));
    }
}
