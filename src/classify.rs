//! Diagnostic family classifier
//!
//! Maps a category name as it appears in the criteria corpus onto its
//! broader diagnostic family. Used to resolve severity scales that are
//! registered per family rather than per category.

const DEPRESSIVE: &[&str] = &[
    "Major Depressive Disorder",
    "Persistent Depressive Disorder",
    "Premenstrual Dysphoric Disorder",
];

const ANXIETY: &[&str] = &[
    "Generalized Anxiety Disorder",
    "Panic Disorder",
    "Agoraphobia",
    "Social Anxiety Disorder",
    "Specific Phobia",
    "Separation Anxiety Disorder",
    "Selective Mutism",
];

const BIPOLAR: &[&str] = &[
    "Bipolar I Disorder",
    "Bipolar II Disorder",
    "Cyclothymic Disorder",
];

const PSYCHOTIC: &[&str] = &[
    "Schizophrenia",
    "Schizoaffective Disorder",
    "Schizophreniform Disorder",
    "Brief Psychotic Disorder",
    "Delusional Disorder",
];

const OBSESSIVE_COMPULSIVE: &[&str] = &[
    "Obsessive-Compulsive Disorder",
    "Body Dysmorphic Disorder",
    "Hoarding Disorder",
    "Trichotillomania",
    "Excoriation (Skin-Picking) Disorder",
];

const DISSOCIATIVE: &[&str] = &[
    "Dissociative Amnesia",
    "Dissociative Identity Disorder",
    "Depersonalization/Derealization Disorder",
];

const NEURODEVELOPMENTAL: &[&str] = &[
    "Attention-Deficit/Hyperactivity Disorder",
    "Oppositional Defiant Disorder",
    "Conduct Disorder",
    "Intermittent Explosive Disorder",
];

const TRAUMA: &[&str] = &[
    "Posttraumatic Stress Disorder",
    "Acute Stress Disorder",
    "Adjustment Disorders",
];

const SUBSTANCE_MARKERS: &[&str] = &["Use Disorder", "Intoxication", "Withdrawal"];

/// Family for a category name, or `None` when it is not recognised
pub fn family_of(category: &str) -> Option<&'static str> {
    let name = category.trim();

    let exact: [(&[&str], &'static str); 7] = [
        (DEPRESSIVE, "Depressive Disorders"),
        (ANXIETY, "Anxiety Disorders"),
        (BIPOLAR, "Bipolar and Related Disorders"),
        (PSYCHOTIC, "Schizophrenia / Psychotic Disorders"),
        (OBSESSIVE_COMPULSIVE, "Obsessive-Compulsive and Related Disorders"),
        (DISSOCIATIVE, "Dissociative Disorders"),
        (NEURODEVELOPMENTAL, "Attention-Deficit/Hyperactivity Disorder"),
    ];
    if let Some((_, family)) = exact.iter().find(|(names, _)| names.contains(&name)) {
        return Some(*family);
    }

    if name.ends_with("Personality Disorder") {
        return Some("Personality Disorders");
    }
    if name == "Gambling Disorder" || SUBSTANCE_MARKERS.iter().any(|m| name.contains(m)) {
        return Some("Addiction / Substance Use & Gambling");
    }
    if TRAUMA.contains(&name) {
        return Some("Posttraumatic Stress Disorder");
    }
    None
}
