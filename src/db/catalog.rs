// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Disease catalog: fixed reference data keyed by classifier label

use rusqlite::{params, Row};

use super::{Database, DiseaseInfo};
use crate::Result;

/// Classifier output labels, in model output order
pub const CLASS_NAMES: [&str; 9] = [
    "Actinic keratosis",
    "Atopic Dermatitis",
    "Benign keratosis",
    "Dermatofibroma",
    "Melanocytic nevus",
    "Melanoma",
    "Squamous cell carcinoma",
    "Tinea Ringworm Candidiasis",
    "Vascular lesion",
];

// (name, description, symptoms, treatments, prevention)
const SEED: [(&str, &str, &str, &str, &str); 9] = [
    ("Actinic keratosis",
     "A rough, scaly patch on the skin caused by years of sun exposure.",
     "Rough, dry, scaly patches; May be red, tan, pink, or flesh-colored; Usually less than 1 inch in diameter.",
     "Cryotherapy, Topical medications, Photodynamic therapy, Curettage and electrosurgery, Chemical peeling.",
     "Use sunscreen daily; Wear protective clothing; Avoid peak sun hours; Regular skin checks."),
    ("Atopic Dermatitis",
     "A chronic skin condition characterized by itchy, inflamed skin.",
     "Red to brownish-gray patches; Itching, which may be severe; Small, raised bumps; Dry, cracked, scaly skin.",
     "Moisturize regularly; Topical corticosteroids; Immunomodulators; Antihistamines; Light therapy.",
     "Moisturize daily; Identify and avoid triggers; Use mild soaps; Manage stress."),
    ("Benign keratosis",
     "A non-cancerous growth on the skin that develops from skin cells.",
     "Waxy, stuck-on appearance; Light brown to black color; Round or oval shape; Flat or slightly raised.",
     "Often no treatment needed; Cryotherapy; Curettage; Laser therapy.",
     "No specific prevention; Regular skin examinations."),
    ("Dermatofibroma",
     "A common benign skin tumor that presents as a firm nodule.",
     "Firm, round bump; Pink, red, or brown color; May be tender to touch; Usually less than 1 cm in diameter.",
     "Often no treatment needed; Surgical excision if bothersome; Cryotherapy; Steroid injections.",
     "No specific prevention; Protect skin from trauma."),
    ("Melanocytic nevus",
     "A common mole that forms when melanocytes grow in clusters.",
     "Brown or black color; Round shape with well-defined borders; Usually less than 6 mm in diameter; Uniform appearance.",
     "Usually no treatment needed; Surgical removal if suspicious.",
     "Monitor for changes; Protect from sun exposure; Regular skin self-exams."),
    ("Melanoma",
     "The most serious type of skin cancer that develops from pigment-producing cells.",
     "Asymmetrical shape; Irregular border; Varied color; Diameter larger than 6 mm; Evolving size, shape, or color.",
     "Surgical excision; Sentinel lymph node biopsy; Immunotherapy; Targeted therapy; Radiation therapy.",
     "Avoid excessive sun exposure; Use sunscreen; Avoid tanning beds; Regular skin self-exams; Professional skin checks."),
    ("Squamous cell carcinoma",
     "A common form of skin cancer that develops from squamous cells.",
     "Firm, red nodule; Flat sore with crusted surface; New sore or raised area on old scar; Rough, scaly patch on lip.",
     "Surgical excision; Mohs surgery; Radiation therapy; Curettage and electrodesiccation; Topical medications.",
     "Use sunscreen daily; Wear protective clothing; Avoid tanning beds; Check skin regularly."),
    ("Tinea Ringworm Candidiasis",
     "Fungal infections affecting the skin, causing ring-shaped rashes.",
     "Ring-shaped rash; Red, scaly, or cracked skin; Itching; Abnormal nail appearance for nail infections.",
     "Antifungal creams; Oral antifungal medications; Keep affected areas clean and dry.",
     "Practice good hygiene; Don't share personal items; Keep skin dry; Wear clean clothes."),
    ("Vascular lesion",
     "Abnormalities of blood vessels that are visible on the skin.",
     "Red or purple discoloration; May be flat or raised; Can appear anywhere on the body; Sometimes painful.",
     "Laser therapy; Sclerotherapy; Surgical removal; Compression therapy.",
     "Protect skin from sun damage; Avoid trauma to skin; Maintain healthy weight and blood pressure."),
];

fn disease_from_row(row: &Row<'_>) -> rusqlite::Result<DiseaseInfo> {
    Ok(DiseaseInfo {
        name: row.get(0)?,
        description: row.get(1)?,
        symptoms: row.get(2)?,
        treatments: row.get(3)?,
        prevention: row.get(4)?,
    })
}

impl Database {
    /// Insert the reference catalog if the table is empty.
    ///
    /// Returns the number of rows inserted, zero when the catalog was already
    /// populated. The count check and the inserts share one transaction.
    pub fn seed_if_empty(&self) -> Result<usize> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let count: i64 = tx.query_row("SELECT COUNT(*) FROM disease_info", [], |row| row.get(0))?;
        if count > 0 {
            return Ok(0);
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO disease_info (name, description, symptoms, treatments, prevention) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (name, description, symptoms, treatments, prevention) in SEED {
                stmt.execute(params![name, description, symptoms, treatments, prevention])?;
            }
        }

        tx.commit()?;
        Ok(SEED.len())
    }

    /// Exact-match lookup by disease name
    pub fn lookup_disease(&self, name: &str) -> Result<Option<DiseaseInfo>> {
        let conn = self.connect()?;
        let result = conn.query_row(
            "SELECT name, description, symptoms, treatments, prevention FROM disease_info WHERE name = ?1",
            params![name],
            disease_from_row,
        );
        match result {
            Ok(info) => Ok(Some(info)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All catalog entries ordered by name
    pub fn list_diseases(&self) -> Result<Vec<DiseaseInfo>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT name, description, symptoms, treatments, prevention FROM disease_info ORDER BY name",
        )?;
        let diseases = stmt
            .query_map([], disease_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(diseases)
    }
}
