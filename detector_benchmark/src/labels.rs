use image::Rgba;

pub const COCO_CLASSES: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

pub const DEFAULT_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);

const CLASS_COLORS: [(&str, [u8; 3]); 20] = [
    ("person", [255, 0, 0]),
    ("bicycle", [0, 0, 255]),
    ("car", [0, 128, 0]),
    ("motorcycle", [255, 255, 0]),
    ("airplane", [128, 0, 128]),
    ("bus", [255, 165, 0]),
    ("train", [255, 192, 203]),
    ("truck", [0, 255, 255]),
    ("boat", [255, 0, 255]),
    ("traffic light", [173, 216, 230]),
    ("fire hydrant", [144, 238, 144]),
    ("stop sign", [240, 128, 128]),
    ("parking meter", [211, 211, 211]),
    ("bench", [0, 0, 139]),
    ("bird", [0, 100, 0]),
    ("cat", [139, 0, 0]),
    ("dog", [255, 140, 0]),
    ("horse", [148, 0, 211]),
    ("sheep", [0, 139, 139]),
    ("cow", [139, 0, 139]),
];

/// Label for a class id, `class_<id>` when the id is outside the table.
pub fn class_label(class_id: usize) -> String {
    match COCO_CLASSES.get(class_id) {
        Some(label) => label.to_string(),
        None => format!("class_{}", class_id),
    }
}

/// Box colour for a label (case-insensitive), red when unlisted.
pub fn color_for(label: &str) -> Rgba<u8> {
    let label = label.to_lowercase();
    CLASS_COLORS
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, [r, g, b])| Rgba([*r, *g, *b, 255]))
        .unwrap_or(DEFAULT_COLOR)
}
