use market_data::{Bar, Timeframe};
use serde_json::json;
use volume_profile::{
    ProfileInputs, ProfileSet, ProfileSettings, VariantKind, VariantParams, compute_profiles,
};

const DAY: i64 = 86_400;
const START: i64 = 1_704_067_200;

/// An up bar over 100..104 and a down bar over 102..106, three rows of 2.0.
#[test]
fn reference_profile() {
    let bars = [
        Bar {
            time: START,
            open: 100.0,
            high: 104.0,
            low: 100.0,
            close: 104.0,
            volume: 400.0,
        },
        Bar {
            time: START + DAY,
            open: 106.0,
            high: 106.0,
            low: 102.0,
            close: 102.0,
            volume: 200.0,
        },
    ];
    let mut params = VariantParams::new(VariantKind::Vrvp, Timeframe::ONE_DAY);
    params.settings = ProfileSettings {
        num_rows: 3,
        ..ProfileSettings::default()
    };

    let profiles = compute_profiles(
        &params,
        &ProfileInputs {
            bars: &bars,
            ..ProfileInputs::default()
        },
    );
    let set = ProfileSet::ready(profiles, json!({ "poc_color": "#ff0000" }));

    let rendered = serde_json::to_string_pretty(&set).unwrap();
    insta::assert_snapshot!("reference_profile", rendered);
}
