//! A consistent fixture mystery used across the test suites.
//!
//! One cast, one case model, and prose that realizes the solution on the
//! page, so the full artifact set passes validation, the scorer floors,
//! and the release gate.

use serde_json::{json, Value};

use crate::core::{Artifact, ArtifactKind};
use crate::pipeline::ProjectSpec;
use crate::stages::default_stages;
use crate::testing::ScriptedPort;
use crate::validation::ValidationContext;

/// The fixture project spec.
#[must_use]
pub fn project_spec() -> ProjectSpec {
    ProjectSpec {
        project_id: "project-trewithen".to_string(),
        title: "The Trewithen Affair".to_string(),
        premise: "A collector is found dead in his locked study; the hall clock has been rewound."
            .to_string(),
        target_length: 20_000,
        narrative_style: "classic fair-play detection".to_string(),
        constraints: Value::Null,
    }
}

/// Valid setting content.
#[must_use]
pub fn setting() -> Value {
    json!({
        "era": "the autumn of 1923",
        "region": "the north coast of Cornwall",
        "locale": "Trewithen Hall, a granite manor above the sea",
        "description": "Storm lanterns burn in the long gallery, servant passages thread the thick walls, and a private cove below the cliff walk receives the tide twice a day."
    })
}

/// Valid background content.
#[must_use]
pub fn background() -> Value {
    json!({
        "summary": "Thomas Abernathy bought Trewithen Hall with money his late partner believed was stolen, and the household has never stopped whispering about it.",
        "history": [
            "Abernathy dissolved his shipping partnership under accusations of a forged ledger.",
            "Edmund Carrow, nephew and heir presumptive, was cut from the will last spring.",
            "Lila Penn came to catalogue the collection and stayed on after a quarrel in London."
        ],
        "tensions": [
            "The will is to be read again at the new year, and nobody has seen the revised draft.",
            "The collection is insured far above its auction value.",
            "The housekeeper keeps the spare study key on a ring she never surrenders."
        ]
    })
}

/// Valid cast content.
#[must_use]
pub fn cast() -> Value {
    json!({
        "members": [
            {
                "name": "Margaret Voss",
                "role": "detective",
                "motive": "Engaged by the insurers to examine the collection before the claim is paid.",
                "alibi": "Arrived on the morning train, hours after the body was found."
            },
            {
                "name": "Edmund Carrow",
                "role": "suspect",
                "motive": "Disinherited last spring and deep in debt to a Plymouth card club.",
                "alibi": "Claims he walked the cliff path alone until one in the morning."
            },
            {
                "name": "Lila Penn",
                "role": "suspect",
                "motive": "Her catalogue would expose which pieces of the collection are forgeries.",
                "alibi": "Says she was developing photographs in the boathouse darkroom."
            },
            {
                "name": "Thomas Abernathy",
                "role": "victim",
                "motive": "None recorded.",
                "alibi": "Found dead in the locked study shortly after midnight."
            },
            {
                "name": "Harriet Boyle",
                "role": "witness",
                "motive": "Keeps the household keys and the household's secrets.",
                "alibi": "Banking the kitchen fire in view of the scullery maid."
            }
        ]
    })
}

/// Valid hard-logic-devices content.
#[must_use]
pub fn hard_logic_devices() -> Value {
    json!({
        "devices": [
            {
                "name": "the hall clock",
                "kind": "timetable",
                "rules": [
                    "The clock is wound every Sunday and loses no measurable time between windings.",
                    "Rewinding it requires the crank kept in the study desk, and leaves the chime out of phase."
                ]
            },
            {
                "name": "the spare study key",
                "kind": "lock",
                "rules": [
                    "Only two keys open the study: the one on the victim's chain and the spare on the housekeeper's ring.",
                    "The housekeeper's ring was signed out once that evening and signed back in before midnight."
                ]
            }
        ]
    })
}

/// Valid case-model content.
#[must_use]
pub fn case_model() -> Value {
    json!({
        "crime": {
            "kind": "murder",
            "victim": "Thomas Abernathy",
            "scene": "the locked study at Trewithen Hall",
            "time": "shortly after midnight"
        },
        "culprit": "Edmund Carrow",
        "deduction_chain": [
            {
                "premise": "The study door was locked and the victim's own key was still on his chain.",
                "inference": "The killer entered and left with the spare key signed out from the housekeeper's ring.",
                "excludes": []
            },
            {
                "premise": "The darkroom log shows prints fixed at half past midnight in the boathouse.",
                "inference": "Whoever fixed those prints could not also have crossed the house unseen at the hour of death.",
                "excludes": ["Lila Penn"]
            }
        ],
        "discriminating_test": {
            "description": "Only the person who held the spare study key could have rewound the hall clock with the crank from the study desk.",
            "excludes": ["Lila Penn"]
        },
        "red_herrings": [
            {
                "description": "A torn gardening glove beneath the rose arbour, sized for a woman's hand.",
                "cited_fact": "the gardening gloves misplaced from the terrace basket",
                "points_to": "Lila Penn"
            }
        ]
    })
}

/// Valid character-profiles content.
#[must_use]
pub fn character_profiles() -> Value {
    json!({
        "profiles": [
            {
                "name": "Margaret Voss",
                "appearance": "Grey travelling coat, steel spectacles, and a notebook bound in oilcloth.",
                "manner": "Asks small questions twice and listens to the difference between the answers.",
                "secrets": ["She has already told the insurers the collection is partly forged."]
            },
            {
                "name": "Edmund Carrow",
                "appearance": "Handsome in a creased way, with salt-stained boots he claims are from the cliff path.",
                "manner": "Charming until a question costs him money, then exact and cold.",
                "secrets": ["The card club has set a date for calling in his notes."]
            },
            {
                "name": "Lila Penn",
                "appearance": "Ink on her fingers and a loupe on a ribbon around her neck.",
                "manner": "Speaks precisely about objects and vaguely about people.",
                "secrets": ["Her catalogue draft already names the forged pieces."]
            },
            {
                "name": "Thomas Abernathy",
                "appearance": "A heavy man gone thin, photographed always beside his cabinets.",
                "manner": "Counted his visitors the way he counted his porcelain.",
                "secrets": ["He meant to confess the forgeries and claim the insurance on the rest."]
            },
            {
                "name": "Harriet Boyle",
                "appearance": "Keys at her waist, cuffs pinned against the kitchen damp.",
                "manner": "Answers for the house, never for herself.",
                "secrets": ["She signed the key ring back in without counting the keys."]
            }
        ]
    })
}

/// Valid location-profiles content.
#[must_use]
pub fn location_profiles() -> Value {
    json!({
        "profiles": [
            {
                "name": "Trewithen Hall",
                "description": "The granite manor itself, its long gallery and servant passages connecting every wing to the kitchen stairs.",
                "connections": ["the study", "the boathouse"]
            },
            {
                "name": "the study",
                "description": "A locked room of cabinets and ledgers where the collection's true accounts were kept.",
                "connections": ["Trewithen Hall"]
            },
            {
                "name": "the boathouse",
                "description": "A tarred shed on the cove fitted as a darkroom, reached only by the cliff path.",
                "connections": ["Trewithen Hall"]
            }
        ]
    })
}

/// Valid clues content.
#[must_use]
pub fn clues() -> Value {
    json!({
        "clues": [
            {
                "id": "c1",
                "description": "The hall clock chimes out of phase, rewound with the crank from the study desk.",
                "location": "the study",
                "discovered_by": "Margaret Voss",
                "implicates": "Edmund Carrow",
                "veracity": "genuine"
            },
            {
                "id": "c2",
                "description": "A torn gardening glove beneath the rose arbour, sized for a woman's hand.",
                "location": "Trewithen Hall",
                "discovered_by": "Harriet Boyle",
                "implicates": "Lila Penn",
                "veracity": "red_herring"
            },
            {
                "id": "c3",
                "description": "The key-ring log shows the spare study key signed out in a hand that slopes like Edmund's.",
                "location": "Trewithen Hall",
                "discovered_by": "Margaret Voss",
                "implicates": "Edmund Carrow",
                "veracity": "genuine"
            },
            {
                "id": "c4",
                "description": "Salt-stained boot prints on the kitchen stairs, nowhere near the cliff path.",
                "location": "the boathouse",
                "discovered_by": "Harriet Boyle",
                "implicates": "Edmund Carrow",
                "veracity": "genuine"
            }
        ]
    })
}

/// Valid outline content.
#[must_use]
pub fn outline() -> Value {
    json!({
        "acts": [
            {
                "number": 1,
                "title": "The Locked Study",
                "scenes": [
                    {
                        "number": 1,
                        "title": "The Morning Train",
                        "summary": "Margaret Voss arrives to appraise the collection and finds the household rehearsing its accounts of the night before.",
                        "characters": ["Margaret Voss", "Harriet Boyle"],
                        "clue_refs": ["c1"]
                    },
                    {
                        "number": 2,
                        "title": "The Key Ring",
                        "summary": "The key-ring log contradicts the housekeeper's memory, and the glove under the arbour points conveniently away from the house.",
                        "characters": ["Margaret Voss", "Harriet Boyle", "Lila Penn"],
                        "clue_refs": ["c2", "c3"]
                    }
                ]
            },
            {
                "number": 2,
                "title": "The Rewound Clock",
                "scenes": [
                    {
                        "number": 1,
                        "title": "The Darkroom Log",
                        "summary": "The boathouse darkroom accounts for Lila Penn's hours, while the boot prints on the kitchen stairs unpick Edmund Carrow's walk.",
                        "characters": ["Margaret Voss", "Lila Penn", "Edmund Carrow"],
                        "clue_refs": ["c4"]
                    },
                    {
                        "number": 2,
                        "title": "The Chime Out of Phase",
                        "summary": "Voss demonstrates that only the holder of the spare key could have rewound the clock, and the household hears the solution.",
                        "characters": ["Margaret Voss", "Edmund Carrow", "Lila Penn", "Harriet Boyle"],
                        "clue_refs": ["c1", "c3"]
                    }
                ]
            }
        ]
    })
}

/// Valid prose content that realizes the solution on the page.
#[must_use]
pub fn prose() -> Value {
    json!({
        "chapters": [
            {
                "number": 1,
                "title": "The Morning Train",
                "paragraphs": [
                    "Margaret Voss came up from the station through a sea fret that clung to the lanes, and Trewithen Hall met her with its curtains drawn. Thomas Abernathy had been found in his study shortly after midnight, the door locked, his own key still on its chain, and the household had spent the hours since rehearsing what it would say to anyone who asked.",
                    "Harriet Boyle received her in the long gallery with the keys at her waist and an account so tidy it had clearly been polished. The spare study key, she said, had not left its ring. The log by the pantry door said otherwise, and Voss read the signed-out line twice before she closed the book without comment."
                ]
            },
            {
                "number": 2,
                "title": "The Glove and the Darkroom",
                "paragraphs": [
                    "The torn gardening glove beneath the rose arbour was sized for a woman's hand, and the household wanted very much for her to make something of it. Lila Penn, who had quarrelled with the dead man over his catalogue, seemed the glove's intended owner in every way but the one that mattered.",
                    "The boathouse darkroom kept its own honest diary. Prints fixed at half past midnight, the fixing bath still sour in the trays, the cliff path the only way back. Lila Penn was ruled out by her own photographs; whoever crossed the house at the hour of death, it was not the woman in the darkroom.",
                    "Edmund Carrow said he had walked the cliff path alone until one in the morning, but the salt on his boots had dried on the kitchen stairs, nowhere near the cliffs. He smiled while he said it, and the smile cost him more than the lie."
                ]
            },
            {
                "number": 3,
                "title": "The Chime Out of Phase",
                "paragraphs": [
                    "The hall clock chimed the quarter wrong, and Voss gathered the household to hear why. The clock had been rewound with the crank from the study desk, behind a locked door, on the night of the murder. Only the person who held the spare study key could have done it. Lila Penn could not be the culprit; the darkroom log and the key-ring entry excluded by the timeline everyone but one man.",
                    "Edmund Carrow, disinherited and in debt, had signed out the spare key in a sloping hand, crossed the house while the fires were banked, and rewound the clock to move the hour of death away from his walk. The forged alibi unravelled exactly where the boot prints said it would.",
                    "Edmund Carrow was arrested before the morning train left, and the house heard the charge read in the long gallery. Harriet Boyle counted her keys again in front of witnesses, and Margaret Voss posted her report to the insurers naming the forgeries and the murderer in the same steady hand."
                ]
            }
        ]
    })
}

/// Returns fixture content for a kind.
#[must_use]
pub fn content_for(kind: ArtifactKind) -> Value {
    match kind {
        ArtifactKind::Setting => setting(),
        ArtifactKind::Background => background(),
        ArtifactKind::Cast => cast(),
        ArtifactKind::HardLogicDevices => hard_logic_devices(),
        ArtifactKind::CaseModel => case_model(),
        ArtifactKind::CharacterProfiles => character_profiles(),
        ArtifactKind::LocationProfiles => location_profiles(),
        ArtifactKind::Clues => clues(),
        ArtifactKind::Outline => outline(),
        ArtifactKind::Prose => prose(),
    }
}

/// One valid artifact per stage, in default stage order.
#[must_use]
pub fn valid_artifact_set() -> Vec<Artifact> {
    default_stages()
        .iter()
        .map(|spec| {
            let mut artifact = Artifact::new(spec.name, content_for(spec.name.kind()));
            artifact.mark_valid();
            artifact
        })
        .collect()
}

/// A validation context holding every fixture artifact.
#[must_use]
pub fn context_for_all() -> ValidationContext {
    let mut ctx = ValidationContext::new();
    for spec in default_stages() {
        ctx.insert(spec.name.kind(), content_for(spec.name.kind()));
    }
    ctx
}

/// Scripts a complete, clean run: one response per stage in default order.
pub fn script_full_run(port: &ScriptedPort) {
    for spec in default_stages() {
        port.push_value(&content_for(spec.name.kind()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::StageName;
    use crate::validation::validate;

    #[test]
    fn test_every_fixture_passes_validation() {
        let ctx = context_for_all();
        for spec in default_stages() {
            let kind = spec.name.kind();
            let report = validate(kind, &content_for(kind), &ctx);
            assert!(
                report.valid,
                "fixture for {} failed validation: {:?}",
                kind, report.errors
            );
        }
    }

    #[test]
    fn test_fixture_artifact_set_covers_all_stages() {
        let artifacts = valid_artifact_set();
        assert_eq!(artifacts.len(), 10);
        assert!(artifacts.iter().all(Artifact::is_valid));
        assert_eq!(artifacts[0].stage, StageName::Setting);
        assert_eq!(artifacts[9].stage, StageName::Prose);
    }

    #[test]
    fn test_script_full_run_queues_ten_responses() {
        let port = ScriptedPort::new();
        script_full_run(&port);
        assert_eq!(port.remaining(), 10);
    }
}
