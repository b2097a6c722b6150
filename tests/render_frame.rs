use brawlcast::pixel::buffer::rgb;
use brawlcast::pixel::palette::{CHISEL_GOLD, SAND_LIGHT};
use brawlcast::render::RenderConfig;
use brawlcast::{CombatState, EncoderProfile, RgbFrame, Stage, Winner};

fn render_at_output(state: &CombatState, now: u64, time_ms: f64) -> RgbFrame {
    let mut r = RenderConfig::default().build();
    r.sync(state, now);
    r.update(16.0);
    let enc = EncoderProfile::default();
    let mut frame = RgbFrame::new(enc.width, enc.height);
    frame.fill_from(r.render(time_ms)).unwrap();
    frame
}

fn pixel(frame: &RgbFrame, x: u32, y: u32) -> [u8; 3] {
    let i = ((y * frame.width() + x) * 3) as usize;
    let b = frame.as_bytes();
    [b[i], b[i + 1], b[i + 2]]
}

#[test]
fn output_frame_matches_the_encoder_contract() {
    let frame = render_at_output(&CombatState::new("m", 180.0, 0), 0, 0.0);
    let enc = EncoderProfile::default();
    assert_eq!(frame.as_bytes().len(), enc.frame_bytes());
    // desert floor at the bottom edge, upscaled by 4
    assert_eq!(pixel(&frame, 3, 719), rgb(SAND_LIGHT));
}

#[test]
fn same_inputs_render_identical_frames() {
    let mut s = CombatState::new("m", 91.2, 0);
    s.fighter_a.hp = 0.4;
    let a = render_at_output(&s, 0, 1_234.0);
    let b = render_at_output(&s, 0, 1_234.0);
    assert_eq!(a.as_bytes(), b.as_bytes());
}

#[test]
fn finished_fight_shows_the_result() {
    let mut s = CombatState::new("m", 0.0, 0);
    s.fighter_b.hp = 0.0;
    s.combat_over = true;
    s.winner = Some(Winner::A);
    let frame = render_at_output(&s, 0, 0.0);
    let gold = rgb(CHISEL_GOLD);
    let bytes = frame.as_bytes();
    assert!(bytes.chunks_exact(3).any(|p| p == gold));

    let live = render_at_output(&CombatState::new("m", 10.0, 0), 0, 0.0);
    assert!(!live.as_bytes().chunks_exact(3).any(|p| p == gold));
}

#[test]
fn a_fresh_hit_changes_the_defender() {
    let mut hit = CombatState::new("m", 100.0, 5_000);
    hit.fighter_b.last_hit = 5_000;
    let flashing = render_at_output(&hit, 5_010, 0.0);
    let settled = render_at_output(&hit, 5_500, 0.0);
    assert_ne!(flashing.as_bytes(), settled.as_bytes());
}

#[test]
fn stages_look_different() {
    let s = CombatState::new("m", 100.0, 0);
    let mut desert = RenderConfig::default();
    desert.stage = Stage::Desert;
    let mut arcade = desert;
    arcade.stage = Stage::Arcade;

    let mut a = desert.build();
    let mut b = arcade.build();
    a.sync(&s, 0);
    b.sync(&s, 0);
    assert_ne!(a.render(0.0).data(), b.render(0.0).data());
}

#[test]
fn png_export_round_trips_dimensions() {
    let frame = render_at_output(&CombatState::new("m", 180.0, 0), 0, 0.0);
    let img = frame.to_image().unwrap();
    assert_eq!(img.dimensions(), (1280, 720));
}
