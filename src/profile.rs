use crate::layout::{Anchor, Clip, Extent, Placement, Shadow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    TryOn,
    BgSwap,
    FlatLay,
    FlatLayBg,
    GarmentInScene,
    Collage,
}

impl Mode {
    pub const ALL: [Mode; 6] = [
        Mode::TryOn,
        Mode::BgSwap,
        Mode::FlatLay,
        Mode::FlatLayBg,
        Mode::GarmentInScene,
        Mode::Collage,
    ];

    /// Parses the wire name. Unknown names yield `None`, which the tables treat as tryOn
    /// for instruction/gradient/placeholder and collage for layout.
    pub fn parse(name: &str) -> Option<Mode> {
        Self::ALL.into_iter().find(|m| m.as_str() == name)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::TryOn => "tryOn",
            Mode::BgSwap => "bgSwap",
            Mode::FlatLay => "flatLay",
            Mode::FlatLayBg => "flatLayBg",
            Mode::GarmentInScene => "garmentInScene",
            Mode::Collage => "collage",
        }
    }
}

pub type Rgba = [u8; 4];

#[derive(Debug)]
pub struct ModeProfile {
    pub instruction: &'static str,
    pub gradient: (Rgba, Rgba),
    pub recipe: &'static [Placement],
    pub placeholder: &'static str,
}

const fn hex(rgb: u32) -> Rgba {
    [(rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8, 255]
}

const TRY_ON_INSTRUCTION: &str = "Create a photorealistic image of the person wearing the clothing item. The person should be naturally dressed in the provided garment with perfect fit, realistic fabric draping, proper lighting, and professional fashion photography quality. Maintain the person's pose, facial features, and background while seamlessly integrating the clothing. The result should look like a real photograph of the person actually wearing the clothes.";
const TRY_ON_GRADIENT: (Rgba, Rgba) = (hex(0x667eea), hex(0x764ba2));
const TRY_ON_PLACEHOLDER: &str = "iVBORw0KGgoAAAANSUhEUgAAAAoAAAAKCAIAAAACUFjqAAAAEklEQVR42mNIq3uFBzGMSmNDABixtHk9T0X8AAAAAElFTkSuQmCC";

const TRY_ON_RECIPE: &[Placement] = &[
    Placement::new(0, Anchor::Center, Extent::FitHeight(0.8)).z(0),
    Placement::new(1, Anchor::TopRight { inset: 20.0 }, Extent::Square(0.3))
        .z(1)
        .opacity(0.8),
];

const BG_SWAP_RECIPE: &[Placement] = &[
    Placement::new(1, Anchor::Origin, Extent::Fill).z(0),
    Placement::new(0, Anchor::Center, Extent::FitHeight(0.9)).z(1),
];

const FLAT_LAY_SHADOW: Shadow = Shadow {
    blur: 10.0,
    offset_x: 5.0,
    offset_y: 5.0,
    color: [0, 0, 0, 77],
};

const fn grid_cell(source: usize, col: u32, row: u32) -> Placement {
    Placement::new(source, Anchor::Grid { col, row, gutter: 40.0 }, Extent::Square(0.4))
        .shadow(FLAT_LAY_SHADOW)
}

const FLAT_LAY_RECIPE: &[Placement] = &[
    grid_cell(0, 0, 0),
    grid_cell(1, 1, 0),
    grid_cell(2, 0, 1),
    grid_cell(3, 1, 1),
];

const COLLAGE_SHADOW: Shadow = Shadow {
    blur: 8.0,
    offset_x: 0.0,
    offset_y: 0.0,
    color: [0, 0, 0, 51],
};

const fn collage_tile(source: usize, x: f32, y: f32) -> Placement {
    Placement::new(source, Anchor::Fraction { x, y }, Extent::Square(0.4))
        .clip(Clip::RoundedRect { radius: 15.0 })
        .shadow(COLLAGE_SHADOW)
}

const COLLAGE_RECIPE: &[Placement] = &[
    collage_tile(0, 0.1, 0.1),
    collage_tile(1, 0.5, 0.1),
    collage_tile(2, 0.1, 0.5),
    collage_tile(3, 0.5, 0.5),
];

static TRY_ON: ModeProfile = ModeProfile {
    instruction: TRY_ON_INSTRUCTION,
    gradient: TRY_ON_GRADIENT,
    recipe: TRY_ON_RECIPE,
    placeholder: TRY_ON_PLACEHOLDER,
};

static BG_SWAP: ModeProfile = ModeProfile {
    instruction: "Generate a photorealistic image where the person is placed in the new background environment while keeping their appearance and clothing exactly the same. Match the lighting, shadows, and atmosphere to make it look naturally integrated.",
    gradient: (hex(0xf093fb), hex(0xf5576c)),
    recipe: BG_SWAP_RECIPE,
    placeholder: "iVBORw0KGgoAAAANSUhEUgAAAAoAAAAKCAIAAAACUFjqAAAAE0lEQVR42mP4MPk3HsQwKo0NAQDqnPk5TGhmpwAAAABJRU5ErkJggg==",
};

static FLAT_LAY: ModeProfile = ModeProfile {
    instruction: "Create a professional flat lay photograph of the clothing items arranged aesthetically on a clean surface with proper shadows and studio lighting.",
    gradient: (hex(0x4facfe), hex(0x00f2fe)),
    recipe: FLAT_LAY_RECIPE,
    placeholder: "iVBORw0KGgoAAAANSUhEUgAAAAoAAAAKCAIAAAACUFjqAAAAEklEQVR42mPwX/MPD2IYlcaGADP/xUWQoR7RAAAAAElFTkSuQmCC",
};

static FLAT_LAY_BG: ModeProfile = ModeProfile {
    instruction: "Generate a realistic flat lay composition with the clothing items beautifully arranged on the provided background surface.",
    gradient: (hex(0x43e97b), hex(0x38f9d7)),
    recipe: COLLAGE_RECIPE,
    placeholder: "iVBORw0KGgoAAAANSUhEUgAAAAoAAAAKCAIAAAACUFjqAAAAEklEQVR42mNwflmNBzGMSmNDAPx3pT0lw3D8AAAAAElFTkSuQmCC",
};

static GARMENT_IN_SCENE: ModeProfile = ModeProfile {
    instruction: "Create a photorealistic scene where the clothing items are naturally placed in the environment with realistic lighting and shadows.",
    gradient: (hex(0xfa709a), hex(0xfee140)),
    recipe: COLLAGE_RECIPE,
    placeholder: "iVBORw0KGgoAAAANSUhEUgAAAAoAAAAKCAIAAAACUFjqAAAAEklEQVR42mP4VTALD2IYlcaGADgMyZFjvPiJAAAAAElFTkSuQmCC",
};

static COLLAGE: ModeProfile = ModeProfile {
    instruction: "Generate an artistic but realistic collage combining the provided images with professional composition and lighting.",
    gradient: (hex(0xa8edea), hex(0xfed6e3)),
    recipe: COLLAGE_RECIPE,
    placeholder: "iVBORw0KGgoAAAANSUhEUgAAAAoAAAAKCAIAAAACUFjqAAAAE0lEQVR42mNY8fYVHsQwKo0NAQARu/mdAkVMegAAAABJRU5ErkJggg==",
};

// Unrecognized modes borrow tryOn's wording, colours and placeholder but lay out as a collage.
static UNRECOGNIZED: ModeProfile = ModeProfile {
    instruction: TRY_ON_INSTRUCTION,
    gradient: TRY_ON_GRADIENT,
    recipe: COLLAGE_RECIPE,
    placeholder: TRY_ON_PLACEHOLDER,
};

pub fn profile(mode: Option<Mode>) -> &'static ModeProfile {
    match mode {
        Some(Mode::TryOn) => &TRY_ON,
        Some(Mode::BgSwap) => &BG_SWAP,
        Some(Mode::FlatLay) => &FLAT_LAY,
        Some(Mode::FlatLayBg) => &FLAT_LAY_BG,
        Some(Mode::GarmentInScene) => &GARMENT_IN_SCENE,
        Some(Mode::Collage) => &COLLAGE,
        None => &UNRECOGNIZED,
    }
}

pub fn placeholder(mode: Option<Mode>) -> &'static str {
    profile(mode).placeholder
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_wire_names_and_rejects_unknown() {
        for mode in Mode::ALL {
            assert_eq!(Mode::parse(mode.as_str()), Some(mode));
        }
        assert_eq!(Mode::parse("TryOn"), None);
        assert_eq!(Mode::parse("sketch"), None);
    }

    #[test]
    fn placeholders_are_valid_pngs() {
        for mode in Mode::ALL.into_iter().map(Some).chain([None]) {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(placeholder(mode))
                .unwrap();
            let img = image::load_from_memory_with_format(&bytes, image::ImageFormat::Png).unwrap();
            assert_eq!((img.width(), img.height()), (10, 10));
        }
    }

    #[test]
    fn unrecognized_mode_borrows_try_on_but_lays_out_as_collage() {
        let unknown = profile(None);
        assert_eq!(unknown.placeholder, placeholder(Some(Mode::TryOn)));
        assert_eq!(unknown.instruction, profile(Some(Mode::TryOn)).instruction);
        assert_eq!(unknown.gradient, profile(Some(Mode::TryOn)).gradient);
        assert_eq!(unknown.recipe.len(), profile(Some(Mode::Collage)).recipe.len());
    }

    #[test]
    fn recipes_cap_sources_at_four() {
        for mode in Mode::ALL {
            let recipe = profile(Some(mode)).recipe;
            assert!(!recipe.is_empty() && recipe.len() <= 4);
            assert!(recipe.iter().all(|p| p.source < 4));
        }
    }
}
