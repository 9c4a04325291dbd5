//! Text-to-image workflow construction and history output extraction.
//!
//! ComfyUI executes graphs in its "API format": a JSON object keyed by
//! node id, each node carrying `class_type` and `inputs`. Links between
//! nodes are `[node_id, output_index]` pairs.

use serde::Deserialize;
use serde_json::{json, Value};

use blockreel_core::render::RenderRequest;

/// Node that produces the final image.
pub const SAVE_NODE_ID: &str = "9";

/// Filename prefix for images saved by ComfyUI.
pub const OUTPUT_PREFIX: &str = "blockreel";

const CFG_SCALE: f64 = 7.5;
const SAMPLER: &str = "euler";
const SCHEDULER: &str = "normal";

/// ComfyUI's seed widget accepts values up to 2^64 - 1, but the JSON
/// number path is only exact up to 2^53.
const MAX_JSON_SEED: u64 = (1 << 53) - 1;

/// Reference to an image stored on the ComfyUI server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageRef {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
}

fn default_kind() -> String {
    "output".to_string()
}

/// Build the txt2img graph for one frame.
pub fn txt2img(request: &RenderRequest, checkpoint: &str) -> Value {
    json!({
        "3": {
            "class_type": "KSampler",
            "inputs": {
                "seed": request.seed & MAX_JSON_SEED,
                "steps": request.steps,
                "cfg": CFG_SCALE,
                "sampler_name": SAMPLER,
                "scheduler": SCHEDULER,
                "denoise": 1.0,
                "model": ["4", 0],
                "positive": ["6", 0],
                "negative": ["7", 0],
                "latent_image": ["5", 0]
            }
        },
        "4": {
            "class_type": "CheckpointLoaderSimple",
            "inputs": { "ckpt_name": checkpoint }
        },
        "5": {
            "class_type": "EmptyLatentImage",
            "inputs": {
                "width": request.width,
                "height": request.height,
                "batch_size": 1
            }
        },
        "6": {
            "class_type": "CLIPTextEncode",
            "inputs": { "text": request.prompt, "clip": ["4", 1] }
        },
        "7": {
            "class_type": "CLIPTextEncode",
            "inputs": { "text": "", "clip": ["4", 1] }
        },
        "8": {
            "class_type": "VAEDecode",
            "inputs": { "samples": ["3", 0], "vae": ["4", 2] }
        },
        SAVE_NODE_ID: {
            "class_type": "SaveImage",
            "inputs": { "filename_prefix": OUTPUT_PREFIX, "images": ["8", 0] }
        }
    })
}

/// Find the first image output recorded for `prompt_id` in a
/// `/history/{prompt_id}` response.
///
/// The save node is preferred; any other node with images is a fallback.
pub fn first_image_output(history: &Value, prompt_id: &str) -> Option<ImageRef> {
    let outputs = history.get(prompt_id)?.get("outputs")?.as_object()?;

    let images_of = |node: &Value| -> Option<ImageRef> {
        node.get("images")?
            .as_array()?
            .iter()
            .find_map(|img| serde_json::from_value::<ImageRef>(img.clone()).ok())
    };

    outputs
        .get(SAVE_NODE_ID)
        .and_then(images_of)
        .or_else(|| outputs.values().find_map(images_of))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RenderRequest {
        RenderRequest {
            prompt: "minecraft style, castle".into(),
            width: 512,
            height: 384,
            steps: 20,
            seed: 42,
        }
    }

    #[test]
    fn txt2img_carries_request_fields() {
        let wf = txt2img(&request(), "model.safetensors");

        assert_eq!(wf["3"]["inputs"]["seed"], 42);
        assert_eq!(wf["3"]["inputs"]["steps"], 20);
        assert_eq!(wf["3"]["inputs"]["cfg"], 7.5);
        assert_eq!(wf["4"]["inputs"]["ckpt_name"], "model.safetensors");
        assert_eq!(wf["5"]["inputs"]["width"], 512);
        assert_eq!(wf["5"]["inputs"]["height"], 384);
        assert_eq!(wf["6"]["inputs"]["text"], "minecraft style, castle");
        assert_eq!(wf["7"]["inputs"]["text"], "");
        assert_eq!(wf["9"]["class_type"], "SaveImage");
    }

    #[test]
    fn large_seeds_stay_json_exact() {
        let mut req = request();
        req.seed = u64::MAX;
        let wf = txt2img(&req, "m");
        assert_eq!(wf["3"]["inputs"]["seed"].as_u64(), Some(MAX_JSON_SEED));
    }

    #[test]
    fn first_image_prefers_save_node() {
        let history = json!({
            "p1": {
                "outputs": {
                    "2": { "images": [{ "filename": "preview.png", "subfolder": "", "type": "temp" }] },
                    "9": { "images": [{ "filename": "blockreel_00001_.png", "subfolder": "", "type": "output" }] }
                }
            }
        });

        let image = first_image_output(&history, "p1").unwrap();
        assert_eq!(image.filename, "blockreel_00001_.png");
        assert_eq!(image.kind, "output");
    }

    #[test]
    fn first_image_falls_back_to_any_node() {
        let history = json!({
            "p1": { "outputs": { "12": { "images": [{ "filename": "x.png" }] } } }
        });

        let image = first_image_output(&history, "p1").unwrap();
        assert_eq!(image.filename, "x.png");
        assert_eq!(image.subfolder, "");
        assert_eq!(image.kind, "output");
    }

    #[test]
    fn missing_prompt_or_images_is_none() {
        assert!(first_image_output(&json!({}), "p1").is_none());
        assert!(first_image_output(&json!({ "p1": { "outputs": {} } }), "p1").is_none());
        assert!(first_image_output(&json!({ "p1": { "outputs": { "9": { "images": [] } } } }), "p1").is_none());
    }
}
