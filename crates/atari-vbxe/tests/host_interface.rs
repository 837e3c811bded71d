//! Memory map, reset and debugger surface as seen from the machine.

use std::collections::HashMap;

use atari_vbxe::{BLIT_STOP_EVENT, Layer, MemoryMap, PageMapping, Vbxe, VbxeConfig};
use emu_core::{EventId, IrqController, IrqSource, Observable, Scheduler, Ticks, Value};

const VIDEO_CONTROL: u8 = 0x40;
const BLITTER_START: u8 = 0x53;
const IRQ_CONTROL: u8 = 0x54;
const MEMAC_B_CONTROL: u8 = 0x5D;
const MEMAC_CONTROL: u8 = 0x5E;
const MEMAC_BANK_SEL: u8 = 0x5F;

#[derive(Default)]
struct TestHost {
    layers: HashMap<Layer, Option<PageMapping>>,
    cancelled: Vec<EventId>,
    irq: bool,
}

impl TestHost {
    fn layer(&self, layer: Layer) -> Option<PageMapping> {
        self.layers.get(&layer).copied().flatten()
    }
}

impl Scheduler for TestHost {
    fn schedule(&mut self, _delay: Ticks, _event: EventId) {}
    fn cancel(&mut self, event: EventId) {
        self.cancelled.push(event);
    }
    fn remaining(&self, _event: EventId) -> Option<Ticks> {
        None
    }
}

impl IrqController for TestHost {
    fn assert_irq(&mut self, _source: IrqSource) {
        self.irq = true;
    }
    fn negate_irq(&mut self, _source: IrqSource) {
        self.irq = false;
    }
}

impl MemoryMap for TestHost {
    fn map_layer(&mut self, layer: Layer, mapping: Option<PageMapping>) {
        self.layers.insert(layer, mapping);
    }
}

fn chip_with(config: VbxeConfig) -> (Vbxe, TestHost) {
    let mut host = TestHost::default();
    let mut vbxe = Vbxe::new(config);
    vbxe.cold_reset(&mut host);
    (vbxe, host)
}

fn chip() -> (Vbxe, TestHost) {
    chip_with(VbxeConfig::default())
}

#[test]
fn cold_reset_maps_registers_and_closes_windows() {
    let (_, host) = chip();

    let regs = host.layer(Layer::Registers).expect("register page mapped");
    assert_eq!(regs.first_page, 0xD6);
    assert_eq!(regs.pages, 1);
    let shadow = host.layer(Layer::GtiaShadow).expect("GTIA page watched");
    assert_eq!((shadow.first_page, shadow.pages), (0xD0, 1));
    assert_eq!(host.layer(Layer::WindowA), None);
    assert_eq!(host.layer(Layer::WindowB), None);
}

#[test]
fn window_a_reads_and_writes_local_memory() {
    let (mut vbxe, mut host) = chip();
    // $9000, 4K, CPU only; bank 2.
    vbxe.write_register(&mut host, MEMAC_CONTROL, 0x98);
    vbxe.write_register(&mut host, MEMAC_BANK_SEL, 0x82);

    let a = host.layer(Layer::WindowA).expect("window A open");
    assert_eq!((a.first_page, a.pages, a.local_base), (0x90, 16, 0x2000));

    assert!(vbxe.window_write(0x9005, 0x77));
    assert_eq!(vbxe.memory.read(0x2005), 0x77);
    assert_eq!(vbxe.window_read(0x9005), Some(0x77));
    assert_eq!(vbxe.window_read(0xA000), None);
    assert_eq!(vbxe.antic_read(0x9005), None, "CPU-only window");
    assert!(!vbxe.window_write(0xA000, 0x11));
}

#[test]
fn window_b_pages_16k_banks() {
    let (mut vbxe, mut host) = chip();
    vbxe.memory.write(0x1_4123, 0x5A);
    vbxe.write_register(&mut host, MEMAC_B_CONTROL, 0xC5);

    let b = host.layer(Layer::WindowB).expect("window B open");
    assert_eq!((b.first_page, b.pages, b.local_base), (0x40, 0x40, 0x1_4000));
    assert_eq!(vbxe.window_read(0x4123), Some(0x5A));
    assert_eq!(vbxe.antic_read(0x4123), Some(0x5A));
}

#[test]
fn gtia_page_write_above_80_warm_resets() {
    let (mut vbxe, mut host) = chip();
    vbxe.write_register(&mut host, MEMAC_CONTROL, 0x98);
    vbxe.write_register(&mut host, MEMAC_BANK_SEL, 0x82);
    vbxe.write_register(&mut host, VIDEO_CONTROL, 0x01);
    vbxe.write_register(&mut host, IRQ_CONTROL, 1);

    vbxe.gtia_shadow_write(&mut host, 0x1A);
    assert!(vbxe.xdl_enabled, "ordinary GTIA writes are ignored");
    assert!(host.layer(Layer::WindowA).is_some());

    host.cancelled.clear();
    vbxe.gtia_shadow_write(&mut host, 0x80);
    assert!(!vbxe.xdl_enabled);
    assert!(!vbxe.irq_enabled);
    assert_eq!(host.layer(Layer::WindowA), None);
    assert_eq!(vbxe.window_read(0x9000), None);
    assert_eq!(host.cancelled, [BLIT_STOP_EVENT]);
    // Bank numbers survive for the next enable.
    assert_eq!(vbxe.read_register(MEMAC_BANK_SEL), Some(0x02));
    assert_eq!(vbxe.read_register(MEMAC_CONTROL), Some(0x90));
}

#[test]
fn warm_reset_stops_a_running_blit() {
    let (mut vbxe, mut host) = chip();
    let mut bcb = [0u8; 21];
    bcb[12] = 0xFF;
    bcb[13] = 1;
    bcb[14] = 0xFF;
    vbxe.memory.load(0, &bcb);
    vbxe.write_register(&mut host, BLITTER_START, 1);
    assert!(vbxe.blitter.is_busy());

    vbxe.gtia_shadow_write(&mut host, 0xFF);
    assert!(!vbxe.blitter.is_busy());
    assert_eq!(vbxe.read_register(BLITTER_START), Some(0));
}

#[test]
fn register_page_can_move() {
    let (mut vbxe, mut host) = chip();
    vbxe.set_register_page(&mut host, 0xD7);
    assert_eq!(host.layer(Layer::Registers).map(|m| m.first_page), Some(0xD7));
}

#[test]
fn mode_5200_fixes_window_a_and_drops_window_b() {
    let (mut vbxe, mut host) = chip();
    vbxe.write_register(&mut host, MEMAC_B_CONTROL, 0x80);
    vbxe.write_register(&mut host, MEMAC_BANK_SEL, 0x23);
    vbxe.set_5200_mode(&mut host, true);

    let a = host.layer(Layer::WindowA).expect("window A always open");
    assert_eq!((a.first_page, a.pages, a.local_base), (0xD8, 16, 0x2_3000));
    assert!(a.antic);
    assert_eq!(host.layer(Layer::WindowB), None);
    let shadow = host.layer(Layer::GtiaShadow).expect("GTIA page watched");
    assert_eq!((shadow.first_page, shadow.pages), (0xC0, 16));

    vbxe.window_write(0xD800, 0x42);
    assert_eq!(vbxe.memory.read(0x2_3000), 0x42);
}

#[test]
fn unknown_registers_float() {
    let (mut vbxe, mut host) = chip();
    assert_eq!(vbxe.read_register(0x4F), None);
    assert_eq!(vbxe.read_register(0x46), None, "palette registers are write-only");
    assert!(!vbxe.write_register(&mut host, 0x60, 0));
}

#[test]
fn queries_track_register_writes() {
    let (mut vbxe, mut host) = chip();
    vbxe.write_register(&mut host, MEMAC_CONTROL, 0x98);
    vbxe.write_register(&mut host, VIDEO_CONTROL, 0x05);

    assert_eq!(vbxe.query("memac.control"), Some(Value::U8(0x98)));
    assert_eq!(vbxe.query("video_control"), Some(Value::U8(0x05)));
    assert_eq!(vbxe.query("overlay.transparent"), Some(Value::Bool(false)));
    assert_eq!(vbxe.query("no.such.path"), None);
    assert!(vbxe.query_paths().contains(&"blitter.state"));
}

#[test]
fn status_report_reflects_windows_and_blitter() {
    let (mut vbxe, mut host) = chip();
    vbxe.write_register(&mut host, MEMAC_B_CONTROL, 0xC1);
    let text = vbxe.status().to_string();

    assert!(text.contains("MEMAC window B:    $C1 | $04000 - CPU and ANTIC"), "{text}");
    assert!(text.contains("MEMAC window A:    $00"), "{text}");
    assert!(text.contains("- disabled"), "{text}");
    assert!(text.contains("Blitter IRQ:       disabled, negated"), "{text}");
}
