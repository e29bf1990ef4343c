use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Winery {
    pub name: String,
    pub region: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub varietal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBottle {
    pub id: String,
    pub name: String,
    pub winery: Winery,
    pub vintage: u32,
    #[serde(default)]
    pub composition: Vec<Component>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u32>,
}

/// What the sommelier looks for. At least one field must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    pub name: Option<String>,
    pub varietal: Vec<String>,
    pub winery: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PickError {
    #[error("{0}")]
    NoCriteria(String),

    #[error("{0}")]
    NoMatch(String),
}

#[derive(Debug, Clone, Default)]
pub struct Sommelier {
    bottles: Vec<StoredBottle>,
}

impl Sommelier {
    pub fn new(bottles: Vec<StoredBottle>) -> Self {
        Self { bottles }
    }

    /// A small cellar for demos.
    pub fn seeded() -> Self {
        let sonoma = Winery {
            name: "Longoria".into(),
            region: "Santa Barbara".into(),
            country: "USA".into(),
            url: Some("https://www.longoriawine.com/".into()),
        };
        let rioja = Winery {
            name: "Bodegas Muga".into(),
            region: "Rioja".into(),
            country: "Spain".into(),
            url: None,
        };
        let component = |varietal: &str, percentage| Component {
            varietal: varietal.into(),
            percentage,
        };
        Self::new(vec![
            StoredBottle {
                id: "1".into(),
                name: "Blue's Cuvee".into(),
                winery: sonoma.clone(),
                vintage: 2015,
                composition: vec![
                    component("Cabernet Franc", Some(60)),
                    component("Merlot", Some(40)),
                ],
                description: Some("Ripe and fleshy".into()),
                rating: Some(4),
            },
            StoredBottle {
                id: "2".into(),
                name: "Fe Ciega".into(),
                winery: sonoma,
                vintage: 2016,
                composition: vec![component("Pinot Noir", None)],
                description: None,
                rating: Some(5),
            },
            StoredBottle {
                id: "3".into(),
                name: "Prado Enea".into(),
                winery: rioja,
                vintage: 2011,
                composition: vec![
                    component("Tempranillo", Some(80)),
                    component("Garnacha", Some(20)),
                ],
                description: Some("Gran Reserva".into()),
                rating: None,
            },
        ])
    }

    /// Bottles matching every criterion that is set.
    pub fn pick(&self, criteria: &Criteria) -> Result<Vec<StoredBottle>, PickError> {
        if criteria.name.is_none() && criteria.varietal.is_empty() && criteria.winery.is_none() {
            return Err(PickError::NoCriteria(
                "must specify a name or one or more varietals or a winery".into(),
            ));
        }
        let matches: Vec<StoredBottle> = self
            .bottles
            .iter()
            .filter(|b| criteria.name.as_ref().map_or(true, |n| &b.name == n))
            .filter(|b| criteria.winery.as_ref().map_or(true, |w| &b.winery.name == w))
            .filter(|b| {
                criteria.varietal.is_empty()
                    || b.composition
                        .iter()
                        .any(|c| criteria.varietal.iter().any(|v| v.eq_ignore_ascii_case(&c.varietal)))
            })
            .cloned()
            .collect();
        if matches.is_empty() {
            return Err(PickError::NoMatch("no bottle matched given criteria".into()));
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_requires_criteria() {
        assert!(matches!(
            Sommelier::seeded().pick(&Criteria::default()),
            Err(PickError::NoCriteria(_))
        ));
    }

    #[test]
    fn test_pick_filters() {
        let sommelier = Sommelier::seeded();
        let by_winery = sommelier
            .pick(&Criteria {
                winery: Some("Longoria".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_winery.len(), 2);

        let by_varietal = sommelier
            .pick(&Criteria {
                varietal: vec!["merlot".into(), "garnacha".into()],
                ..Default::default()
            })
            .unwrap();
        let ids: Vec<_> = by_varietal.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, ["1", "3"]);

        let combined = sommelier.pick(&Criteria {
            name: Some("Fe Ciega".into()),
            varietal: vec!["Tempranillo".into()],
            winery: None,
        });
        assert!(matches!(combined, Err(PickError::NoMatch(_))));
    }
}
