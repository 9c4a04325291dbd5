//! Scene prompt scheduling.
//!
//! A video is split into four equal narrative quarters (beginning, middle,
//! action, ending). Each quarter renders with its own variant of the base
//! prompt so long sequences don't repeat one flat prompt.

/// Number of narrative scenes a video is divided into.
pub const SCENE_COUNT: usize = 4;

/// The four scene variants of `base_prompt`, in narrative order.
pub fn scene_prompts(base_prompt: &str) -> [String; SCENE_COUNT] {
    [
        format!("beginning scene, {base_prompt}, starting adventure"),
        format!("middle scene, {base_prompt}, exploring deeper"),
        format!("action scene, {base_prompt}, intense moment"),
        format!("ending scene, {base_prompt}, conclusion"),
    ]
}

/// Scene index for a temporal fraction: `min(floor(fraction * 4), 3)`.
///
/// Negative and NaN fractions map to the first scene.
pub fn scene_index(fraction: f64) -> usize {
    if fraction.is_nan() || fraction <= 0.0 {
        return 0;
    }
    let index = (fraction * SCENE_COUNT as f64).floor() as usize;
    index.min(SCENE_COUNT - 1)
}

/// Pick the scene prompt that applies at `fraction` of the video.
pub fn select_scene_prompt(prompts: &[String; SCENE_COUNT], fraction: f64) -> &str {
    &prompts[scene_index(fraction)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_at_quarter_boundaries() {
        assert_eq!(scene_index(0.0), 0);
        assert_eq!(scene_index(0.24), 0);
        assert_eq!(scene_index(0.25), 1);
        assert_eq!(scene_index(0.5), 2);
        assert_eq!(scene_index(0.75), 3);
        assert_eq!(scene_index(0.99), 3);
    }

    #[test]
    fn index_is_clamped() {
        assert_eq!(scene_index(1.0), 3);
        assert_eq!(scene_index(7.5), 3);
        assert_eq!(scene_index(-0.5), 0);
        assert_eq!(scene_index(f64::NAN), 0);
    }

    #[test]
    fn prompts_wrap_base_with_phase_labels() {
        let prompts = scene_prompts("castle");
        assert_eq!(prompts[0], "beginning scene, castle, starting adventure");
        assert_eq!(prompts[1], "middle scene, castle, exploring deeper");
        assert_eq!(prompts[2], "action scene, castle, intense moment");
        assert_eq!(prompts[3], "ending scene, castle, conclusion");
    }

    #[test]
    fn selection_follows_index() {
        let prompts = scene_prompts("castle");
        assert!(select_scene_prompt(&prompts, 0.1).starts_with("beginning"));
        assert!(select_scene_prompt(&prompts, 0.6).starts_with("action"));
        assert!(select_scene_prompt(&prompts, 0.9).starts_with("ending"));
    }

    #[test]
    fn eight_frame_video_spends_two_frames_per_scene() {
        let scenes: Vec<_> = (0..8).map(|i| scene_index(i as f64 / 8.0)).collect();
        assert_eq!(scenes, vec![0, 0, 1, 1, 2, 2, 3, 3]);
    }
}
