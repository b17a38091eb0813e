//! SHAPE-extension input regions and EWMH stacking hints over `x11rb`.

use tracing::{debug, warn};
use winit::raw_window_handle::{HasWindowHandle, RawWindowHandle};
use winit::window::Window;
use x11rb::connection::{Connection, RequestConnection};
use x11rb::protocol::shape::{self, ConnectionExt as _};
use x11rb::protocol::xproto::{
    self, AtomEnum, ClientMessageEvent, ConfigureWindowAux, ConnectionExt as _, EventMask,
    PropMode, Rectangle, StackMode,
};
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use crate::error::ShapeError;
use crate::geometry::Rect;
use crate::processing::region::Region;

use super::{ShapeDriver, ShapeOutcome};

const NET_WM_STATE_REMOVE: u32 = 0;
const NET_WM_STATE_ADD: u32 = 1;
const SOURCE_APPLICATION: u32 = 1;

/// X11 window id behind a winit window, if it is an X11 window at all.
pub(super) fn native_window_id(window: &Window) -> Option<u32> {
    let handle = window.window_handle().ok()?;
    match handle.as_raw() {
        RawWindowHandle::Xlib(h) => u32::try_from(h.window).ok(),
        RawWindowHandle::Xcb(h) => Some(h.window.get()),
        _ => None,
    }
}

struct Atoms {
    net_wm_state: xproto::Atom,
    net_wm_state_above: xproto::Atom,
    net_wm_window_opacity: xproto::Atom,
}

impl Atoms {
    fn intern(conn: &RustConnection) -> Result<Self, ShapeError> {
        let intern = |name: &str| -> Result<xproto::Atom, ShapeError> {
            let atom = conn.intern_atom(false, name.as_bytes())?.reply()?.atom;
            if atom == x11rb::NONE {
                return Err(ShapeError::Lookup(name.to_string()));
            }
            Ok(atom)
        };
        Ok(Self {
            net_wm_state: intern("_NET_WM_STATE")?,
            net_wm_state_above: intern("_NET_WM_STATE_ABOVE")?,
            net_wm_window_opacity: intern("_NET_WM_WINDOW_OPACITY")?,
        })
    }
}

/// Input-shape driver for one X11 window on a private connection.
pub struct X11ShapeDriver {
    conn: RustConnection,
    window: xproto::Window,
    root: xproto::Window,
    has_shape: bool,
    atoms: Atoms,
}

impl X11ShapeDriver {
    pub fn connect(window: u32) -> Result<Self, ShapeError> {
        let (conn, screen_num) = x11rb::connect(None)?;
        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .map(|screen| screen.root)
            .ok_or_else(|| ShapeError::Lookup(format!("screen {screen_num}")))?;
        let has_shape = conn
            .extension_information(shape::X11_EXTENSION_NAME)?
            .is_some();
        if !has_shape {
            warn!(window, "{}", ShapeError::MissingExtension);
        }
        let atoms = Atoms::intern(&conn)?;
        debug!(window, has_shape, "x11 shape driver connected");
        Ok(Self {
            conn,
            window,
            root,
            has_shape,
            atoms,
        })
    }

    fn set_input_rects(&self, rects: &[Rectangle]) -> Result<(), ShapeError> {
        self.conn
            .shape_rectangles(
                shape::SO::SET,
                shape::SK::INPUT,
                xproto::ClipOrdering::UNSORTED,
                self.window,
                0,
                0,
                rects,
            )?
            .check()?;
        Ok(())
    }

    fn reset_input_shape(&self) -> Result<(), ShapeError> {
        self.conn
            .shape_mask(
                shape::SO::SET,
                shape::SK::INPUT,
                self.window,
                0,
                0,
                x11rb::NONE,
            )?
            .check()?;
        Ok(())
    }

    fn send_above(&self, above: bool) -> Result<(), ShapeError> {
        let action = if above {
            NET_WM_STATE_ADD
        } else {
            NET_WM_STATE_REMOVE
        };
        let event = ClientMessageEvent::new(
            32,
            self.window,
            self.atoms.net_wm_state,
            [action, self.atoms.net_wm_state_above, 0, SOURCE_APPLICATION, 0],
        );
        let sent = self.conn.send_event(
            false,
            self.root,
            EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY,
            event,
        )?;
        if above {
            self.conn
                .configure_window(
                    self.window,
                    &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
                )?
                .check()?;
        } else {
            sent.check()?;
        }
        Ok(())
    }

    fn write_opacity(&self, opacity: f32) -> Result<(), ShapeError> {
        let opacity = opacity.clamp(0.0, 1.0);
        if opacity >= 1.0 {
            self.conn
                .delete_property(self.window, self.atoms.net_wm_window_opacity)?
                .check()?;
        } else {
            let value = (f64::from(opacity) * f64::from(u32::MAX)).round() as u32;
            self.conn
                .change_property32(
                    PropMode::REPLACE,
                    self.window,
                    self.atoms.net_wm_window_opacity,
                    AtomEnum::CARDINAL,
                    &[value],
                )?
                .check()?;
        }
        Ok(())
    }

    fn finish(&self, op: &'static str, result: Result<(), ShapeError>) -> ShapeOutcome {
        match result {
            Ok(()) => ShapeOutcome::Applied,
            Err(err) => {
                warn!(op, window = self.window, error = %err, "x11 request failed");
                ShapeOutcome::Unsupported
            }
        }
    }

    fn shape_op(
        &self,
        op: &'static str,
        f: impl FnOnce(&Self) -> Result<(), ShapeError>,
    ) -> ShapeOutcome {
        if !self.has_shape {
            debug!(op, "input shaping unavailable");
            return ShapeOutcome::Unsupported;
        }
        let result = f(self);
        self.finish(op, result)
    }
}

fn wire_rects<'a>(rects: impl IntoIterator<Item = &'a Rect>) -> Vec<Rectangle> {
    rects
        .into_iter()
        .filter_map(Rect::to_wire)
        .map(|w| Rectangle {
            x: w.x,
            y: w.y,
            width: w.width,
            height: w.height,
        })
        .collect()
}

impl ShapeDriver for X11ShapeDriver {
    fn backend(&self) -> &'static str {
        "x11-shape"
    }

    fn set_full_window_clickable(&mut self) -> ShapeOutcome {
        self.shape_op("clickable", Self::reset_input_shape)
    }

    fn set_full_window_passthrough(&mut self) -> ShapeOutcome {
        self.shape_op("passthrough", |d| d.set_input_rects(&[]))
    }

    fn set_clickable_rectangle(&mut self, rect: Rect) -> ShapeOutcome {
        let rects = wire_rects([&rect]);
        self.shape_op("rectangle", |d| d.set_input_rects(&rects))
    }

    fn set_clickable_region(&mut self, region: &Region) -> ShapeOutcome {
        let rects = wire_rects(region.rects());
        debug!(rects = rects.len(), window = self.window, "pushing input region");
        self.shape_op("region", |d| d.set_input_rects(&rects))
    }

    fn raise_above(&mut self, above: bool) -> ShapeOutcome {
        let result = self.send_above(above);
        self.finish("raise", result)
    }

    fn set_opacity(&mut self, opacity: f32) -> ShapeOutcome {
        let result = self.write_opacity(opacity);
        self.finish("opacity", result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_rects_drop_unrepresentable() {
        let rects = [
            Rect::new(0, 0, 10, 10),
            Rect::new(50_000, 0, 10, 10),
            Rect::new(-5, 3, 70_000, 2),
        ];
        let wire = wire_rects(&rects);
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[1].x, -5);
        assert_eq!(wire[1].width, i16::MAX as u16 + 5);
    }
}
