use clap::{ArgGroup, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Estimate calories and macronutrients from a meal photo", long_about = None)]
#[command(group(ArgGroup::new("source").required(true).args(["image", "data_url"])))]
pub struct Cli {
    /// Path to the meal photo (png, jpg, jpeg, gif or webp)
    #[arg(short, long)]
    pub image: Option<PathBuf>,

    /// Image as a base64 data URL (data:image/jpeg;base64,...) or bare base64
    #[arg(long)]
    pub data_url: Option<String>,

    /// Vision model to use instead of VISION_MODEL
    #[arg(long)]
    pub model: Option<String>,

    /// USDA FoodData Central key to use instead of USDA_API_KEY
    #[arg(long, conflicts_with = "no_lookup")]
    pub usda_key: Option<String>,

    /// Skip the nutrient database and estimate every item
    #[arg(long)]
    pub no_lookup: bool,
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_an_image_source() {
        assert!(Cli::try_parse_from(["meal-vision"]).is_err());
        assert!(Cli::try_parse_from(["meal-vision", "--image", "a.jpg", "--data-url", "xx"]).is_err());
    }

    #[test]
    fn test_parses_flags() {
        let cli = Cli::try_parse_from(["meal-vision", "-i", "plate.png", "--no-lookup", "--model", "gpt-4o-mini"])
            .unwrap();
        assert_eq!(cli.image, Some(PathBuf::from("plate.png")));
        assert!(cli.no_lookup);
        assert_eq!(cli.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(cli.usda_key, None);
    }

    #[test]
    fn test_usda_key_flag() {
        let cli = Cli::try_parse_from(["meal-vision", "--data-url", "xx", "--usda-key", "DEMO_KEY"])
            .unwrap();
        assert_eq!(cli.usda_key.as_deref(), Some("DEMO_KEY"));
        assert!(Cli::try_parse_from(["meal-vision", "-i", "a.jpg", "--usda-key", "k", "--no-lookup"]).is_err());
    }
}
