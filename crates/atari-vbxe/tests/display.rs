//! Display list, overlay and mid-line register changes, checked against
//! the finished scanline.

use atari_vbxe::{
    CoreRevision, Layer, MemoryMap, OverlayMode, PageMapping, Vbxe, VbxeConfig, priority::plane,
};
use emu_core::{EventId, IrqController, IrqSource, Observable, Scheduler, Ticks, Value};

const VIDEO_CONTROL: u8 = 0x40;
const XDL_ADR0: u8 = 0x41;
const CSEL: u8 = 0x44;
const PSEL: u8 = 0x45;
const CR: u8 = 0x46;
const CG: u8 = 0x47;
const CB: u8 = 0x48;
const COLMASK: u8 = 0x49;
const COLDETECT: u8 = 0x4A;

const COLBK: u8 = 0x1A;

const GMON: u16 = 0x0002;
const OVOFF: u16 = 0x0004;
const MAPON: u16 = 0x0008;
const RPTL: u16 = 0x0020;
const OVADR: u16 = 0x0040;
const MAPADR: u16 = 0x0200;
const ATT: u16 = 0x0800;
const LR: u16 = 0x2000;
const END: u16 = 0x8000;

const OVERLAY: u32 = 0x1000;
const OVERLAY_RGB: u32 = 0xAB_CDEF;

#[derive(Default)]
struct TestHost;

impl Scheduler for TestHost {
    fn schedule(&mut self, _delay: Ticks, _event: EventId) {}
    fn cancel(&mut self, _event: EventId) {}
    fn remaining(&self, _event: EventId) -> Option<Ticks> {
        None
    }
}

impl IrqController for TestHost {
    fn assert_irq(&mut self, _source: IrqSource) {}
    fn negate_irq(&mut self, _source: IrqSource) {}
}

impl MemoryMap for TestHost {
    fn map_layer(&mut self, _layer: Layer, _mapping: Option<PageMapping>) {}
}

/// Grey ramp: entry `i` is `i` in every channel.
fn grey(i: u8) -> u32 {
    u32::from(i) * 0x01_0101
}

fn chip_with(revision: CoreRevision) -> (Vbxe, TestHost) {
    let mut host = TestHost;
    let mut vbxe = Vbxe::new(VbxeConfig {
        revision,
        ..VbxeConfig::default()
    });
    let mut palette = [0u32; 256];
    for (i, e) in palette.iter_mut().enumerate() {
        *e = grey(i as u8);
    }
    vbxe.set_default_palette(&palette);
    vbxe.cold_reset(&mut host);
    vbxe.add_register_change(0, COLBK, 0x10);
    (vbxe, host)
}

fn chip() -> (Vbxe, TestHost) {
    chip_with(CoreRevision::Fx126)
}

/// Overlay colour 5 in bank 1 set through the palette registers.
fn set_overlay_colour(vbxe: &mut Vbxe, host: &mut TestHost) {
    vbxe.write_register(host, PSEL, 1);
    vbxe.write_register(host, CSEL, 5);
    vbxe.write_register(host, CR, 0xAA);
    vbxe.write_register(host, CG, 0xCC);
    vbxe.write_register(host, CB, 0xEE);
}

fn record(control: u16, payload: &[u8]) -> Vec<u8> {
    let mut r = control.to_le_bytes().to_vec();
    r.extend_from_slice(payload);
    r
}

fn address_and_step(addr: u32, step: u16) -> [u8; 5] {
    let [a0, a1, a2, _] = addr.to_le_bytes();
    let [s0, s1] = step.to_le_bytes();
    [a0, a1, a2, s0, s1]
}

/// Install a display list at $00000, enable it and start a frame.
fn start_list(vbxe: &mut Vbxe, host: &mut TestHost, records: &[Vec<u8>], video_control: u8) {
    vbxe.memory.load(0, &records.concat());
    vbxe.write_register(host, XDL_ADR0, 0);
    vbxe.write_register(host, VIDEO_CONTROL, video_control);
    vbxe.begin_frame();
}

/// One LR overlay line over the normal window, then the end of the list.
fn lr_overlay_list(extra: u16, payload_tail: &[u8]) -> Vec<Vec<u8>> {
    let mut payload = address_and_step(OVERLAY, 160).to_vec();
    payload.extend_from_slice(payload_tail);
    vec![record(GMON | LR | OVADR | END | extra, &payload)]
}

fn render_line(vbxe: &mut Vbxe, host: &mut TestHost, merge: &[u8; 228]) -> Vec<u32> {
    vbxe.begin_scanline(host, false);
    vbxe.render_scanline(228, merge, &[0; 228], true);
    vbxe.end_scanline();
    vbxe.scanline().to_vec()
}

#[test]
fn repeat_holds_the_record_for_extra_lines() {
    let (mut vbxe, mut host) = chip();
    let mut first = vec![3];
    first.extend_from_slice(&address_and_step(OVERLAY, 0x140));
    start_list(
        &mut vbxe,
        &mut host,
        &[record(GMON | LR | RPTL | OVADR, &first), record(OVOFF | END, &[])],
        0x01,
    );

    vbxe.begin_scanline(&mut host, false);
    assert_eq!(vbxe.xdl.cursor.fetch_address, 8);
    assert_eq!(vbxe.dma_charge, 8 + 160);
    vbxe.end_scanline();
    assert_eq!(vbxe.display.overlay_address, OVERLAY + 0x140);

    for line in 1..4 {
        vbxe.begin_scanline(&mut host, false);
        assert_eq!(vbxe.xdl.cursor.fetch_address, 8, "line {line}");
        assert_eq!(vbxe.dma_charge, 160, "line {line}");
        vbxe.end_scanline();
    }

    vbxe.begin_scanline(&mut host, false);
    vbxe.end_scanline();
    assert_eq!(vbxe.xdl.cursor.fetch_address, 10);
    assert!(!vbxe.xdl.cursor.active);
    assert_eq!(vbxe.display.overlay_mode, OverlayMode::Disabled);
    assert_eq!(vbxe.dma_charge, 2);

    assert_eq!(vbxe.query("xdl.history.0.record"), Some(Value::U32(0)));
    assert_eq!(vbxe.query("xdl.history.2.record"), Some(Value::String("none".into())));
    assert_eq!(vbxe.query("xdl.history.4.record"), Some(Value::U32(8)));
}

#[test]
fn listing_decodes_records() {
    let (mut vbxe, mut host) = chip();
    let mut first = vec![3];
    first.extend_from_slice(&address_and_step(OVERLAY, 0x140));
    start_list(
        &mut vbxe,
        &mut host,
        &[record(GMON | LR | RPTL | OVADR, &first), record(OVOFF | END, &[])],
        0x01,
    );

    let listing = vbxe.xdl_listing();
    assert_eq!(listing.records.len(), 2);
    assert_eq!(listing.records[0].lines(), 4);
    assert_eq!(listing.records[0].overlay, Some((OVERLAY, 0x140)));
    assert!(listing.records[1].is_end());
}

#[test]
fn list_off_means_no_fetches() {
    let (mut vbxe, mut host) = chip();
    start_list(&mut vbxe, &mut host, &lr_overlay_list(0, &[]), 0x00);

    vbxe.begin_scanline(&mut host, false);
    assert_eq!(vbxe.dma_charge, 0);
    assert_eq!(vbxe.display.overlay_mode, OverlayMode::Disabled);
}

#[test]
fn end_scanline_steps_the_overlay_once() {
    let (mut vbxe, mut host) = chip();
    start_list(&mut vbxe, &mut host, &lr_overlay_list(0, &[]), 0x01);

    vbxe.begin_scanline(&mut host, false);
    vbxe.end_scanline();
    vbxe.end_scanline();
    assert_eq!(vbxe.display.overlay_address, OVERLAY + 160);
}

#[test]
fn lores_overlay_covers_the_normal_window() {
    let (mut vbxe, mut host) = chip();
    set_overlay_colour(&mut vbxe, &mut host);
    vbxe.memory.fill(OVERLAY, 160, 5);
    start_list(&mut vbxe, &mut host, &lr_overlay_list(0, &[]), 0x01);

    let line = render_line(&mut vbxe, &mut host, &[0; 228]);

    assert_eq!(line[191], grey(0x10));
    assert!(line[192..832].iter().all(|&p| p == OVERLAY_RGB));
    assert_eq!(line[832], grey(0x10));
    assert_eq!(vbxe.dma_charge, 7 + 160);
}

#[test]
fn index_zero_is_transparent_unless_opaque() {
    let (mut vbxe, mut host) = chip();
    set_overlay_colour(&mut vbxe, &mut host);
    vbxe.memory.fill(OVERLAY + 80, 80, 5);
    start_list(&mut vbxe, &mut host, &lr_overlay_list(0, &[]), 0x01);

    let line = render_line(&mut vbxe, &mut host, &[0; 228]);
    assert_eq!(line[192], grey(0x10));
    assert_eq!(line[(48 + 80) * 4], OVERLAY_RGB);

    // VIDEO_CONTROL bit 2: colour 0 of bank 1 is black and now drawn.
    start_list(&mut vbxe, &mut host, &lr_overlay_list(0, &[]), 0x05);
    let line = render_line(&mut vbxe, &mut host, &[0; 228]);
    assert_eq!(line[192], 0);
    assert_eq!(line[(48 + 80) * 4], OVERLAY_RGB);
}

#[test]
fn priority_layout_depends_on_the_core_revision() {
    // $EF as written: on FX 1.26 P0 covers the overlay, on FX 1.24 the
    // nibbles are swapped and PF0 does.
    let att = [0x11, 0xEF];
    let merge = [plane::PF0; 228];

    for (revision, covered) in [(CoreRevision::Fx126, false), (CoreRevision::Fx124, true)] {
        let (mut vbxe, mut host) = chip_with(revision);
        set_overlay_colour(&mut vbxe, &mut host);
        vbxe.memory.fill(OVERLAY, 160, 5);
        start_list(&mut vbxe, &mut host, &lr_overlay_list(ATT, &att), 0x01);

        let line = render_line(&mut vbxe, &mut host, &merge);
        assert_eq!(line[400] != OVERLAY_RGB, covered, "{revision:?}");
        assert_eq!(vbxe.query("overlay.priority"), Some(Value::U8(0xEF)), "{revision:?}");
    }
}

#[test]
fn overlay_collisions_are_sticky_until_cleared() {
    let (mut vbxe, mut host) = chip();
    vbxe.memory.fill(OVERLAY, 160, 5);
    start_list(&mut vbxe, &mut host, &lr_overlay_list(0, &[]), 0x01);
    vbxe.write_register(&mut host, COLMASK, plane::PF1 | plane::P0);

    let mut merge = [0; 228];
    merge[100] = plane::PF1 | plane::PF2;
    render_line(&mut vbxe, &mut host, &merge);
    assert_eq!(vbxe.read_register(COLDETECT), Some(plane::PF1));

    vbxe.write_register(&mut host, COLDETECT, 0);
    assert_eq!(vbxe.read_register(COLDETECT), Some(0));
}

#[test]
fn colour_change_lands_on_its_clock() {
    let (mut vbxe, mut host) = chip();

    vbxe.begin_scanline(&mut host, false);
    vbxe.add_register_change(100, COLBK, 0x20);
    vbxe.render_scanline(228, &[0; 228], &[0; 228], true);
    vbxe.end_scanline();
    let line = vbxe.scanline();

    assert_eq!(line[0], grey(0x10));
    assert_eq!(line[399], grey(0x10));
    assert_eq!(line[400], grey(0x20));
    assert_eq!(line[911], grey(0x20));
}

#[test]
fn unrendered_changes_apply_at_end_of_line() {
    let (mut vbxe, mut host) = chip();

    vbxe.begin_scanline(&mut host, false);
    vbxe.add_register_change(200, COLBK, 0x30);
    vbxe.render_scanline(150, &[0; 228], &[0; 228], true);
    vbxe.end_scanline();

    vbxe.begin_scanline(&mut host, false);
    assert_eq!(vbxe.scanline()[0], grey(0x30));
}

#[test]
fn rendering_in_pieces_matches_one_pass() {
    let mut merge = [0; 228];
    for (i, m) in merge.iter_mut().enumerate() {
        *m = if i % 3 == 0 { plane::PF0 } else { 0 };
    }

    let (mut a, mut host) = chip();
    a.add_register_change(0, 0x16, 0x48);
    let whole = render_line(&mut a, &mut host, &merge);

    let (mut b, mut host) = chip();
    b.add_register_change(0, 0x16, 0x48);
    b.begin_scanline(&mut host, false);
    for x2 in [17, 64, 64, 150, 228] {
        b.render_scanline(x2, &merge, &[0; 228], true);
    }
    b.end_scanline();

    assert_eq!(whole, b.scanline());
}

#[test]
fn overlay_dma_reduces_blitter_throughput() {
    // 200-byte rows with the AND mask on cost 400 units each.
    let mut bcb = [0u8; 21];
    bcb[3..5].copy_from_slice(&200u16.to_le_bytes());
    bcb[5] = 1;
    bcb[6..9].copy_from_slice(&[0x00, 0x00, 0x02]);
    bcb[9..11].copy_from_slice(&200u16.to_le_bytes());
    bcb[11] = 1;
    bcb[12] = 199;
    bcb[14] = 7;
    bcb[15] = 0xFF;

    let rows_left = |overlay: bool| {
        let (mut vbxe, mut host) = chip();
        vbxe.memory.load(0x4_0000, &bcb);
        vbxe.write_register(&mut host, 0x52, 0x04);
        vbxe.write_register(&mut host, 0x53, 1);
        start_list(&mut vbxe, &mut host, &lr_overlay_list(0, &[]), u8::from(overlay));
        vbxe.begin_scanline(&mut host, false);
        vbxe.blitter.rows_left
    };

    assert_eq!(rows_left(false), 5);
    assert_eq!(rows_left(true), 6);
}

#[test]
fn attribute_map_fetch_is_charged_on_reload() {
    let (mut vbxe, mut host) = chip();
    start_list(
        &mut vbxe,
        &mut host,
        &[record(MAPON | MAPADR | END, &address_and_step(0x2000, 0x80))],
        0x01,
    );

    vbxe.begin_scanline(&mut host, false);
    // 320 pixels of 8-pixel cells: 40 cells, 4 bytes each.
    assert_eq!(vbxe.dma_charge, 7 + 160);
    assert!(vbxe.display.map_enabled);
    vbxe.end_scanline();

    vbxe.begin_scanline(&mut host, false);
    assert!(!vbxe.display.map_enabled, "list ended");
    assert_eq!(vbxe.dma_charge, 0);
}
