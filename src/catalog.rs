use serde::Serialize;

/// SFX pack offered on the site
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pack {
    pub id: &'static str,
    pub title: &'static str,
    /// Display price, e.g. "25.00€" or "Gratuit"
    pub price: &'static str,
    pub is_free: bool,
    pub badge: &'static str,
    pub description: &'static str,
    /// Display count, e.g. "50+ Samples"
    pub sample_count: &'static str,
    pub preview_url: Option<&'static str>,
    pub download_url: &'static str,
}

static PACKS: [Pack; 3] = [
    Pack {
        id: "cinematic-textures",
        title: "Cinematic Textures",
        price: "25.00€",
        is_free: false,
        badge: "Premium",
        description: "Un pack complet de textures atmosphériques pour vos productions visuelles. \
                      Haute qualité, 24-bit WAV, prêt pour l'industrie.",
        sample_count: "50+ Samples",
        preview_url: None,
        download_url: "/downloads/cinematic-textures.zip",
    },
    Pack {
        id: "analog-hits",
        title: "Analog Hits",
        price: "Gratuit",
        is_free: true,
        badge: "Gratuit",
        description: "Une sélection de percussions analogiques enregistrées sur bandes. \
                      Sons authentiques et chaleureux.",
        sample_count: "20+ One-shots",
        preview_url: None,
        download_url: "/downloads/analog-hits.zip",
    },
    Pack {
        id: "falaw-signature",
        title: "Falaw Signature",
        price: "15.00€",
        is_free: false,
        badge: "Exclusif",
        description: "Le pack signature de Falaw. Drums & FX exclusifs. \
                      Créé avec passion pour des productions uniques.",
        sample_count: "Vol. 1",
        preview_url: None,
        download_url: "/downloads/falaw-signature.zip",
    },
];

pub fn packs() -> &'static [Pack] {
    &PACKS
}

pub fn find_pack(id: &str) -> Option<&'static Pack> {
    PACKS.iter().find(|pack| pack.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_contents() {
        let ids: Vec<_> = packs().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["cinematic-textures", "analog-hits", "falaw-signature"]);
        assert_eq!(packs().iter().filter(|p| p.is_free).count(), 1);
    }

    #[test]
    fn test_find_pack() {
        let pack = find_pack("analog-hits").unwrap();
        assert_eq!(pack.title, "Analog Hits");
        assert_eq!(pack.price, "Gratuit");
        assert!(find_pack("unknown").is_none());
    }

    #[test]
    fn test_pack_serializes_for_listing() {
        let json = serde_json::to_value(find_pack("falaw-signature").unwrap()).unwrap();
        assert_eq!(json["sample_count"], "Vol. 1");
        assert_eq!(json["preview_url"], serde_json::Value::Null);
    }
}
