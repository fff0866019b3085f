//! Prompt Construction
//!
//! All prompt text lives here: the per-mode editor personas, the per-chunk
//! analysis instructions, and the aggregation prompt that merges chunk
//! findings into one report. Everything is a pure function of its inputs so
//! the rest of the pipeline never concatenates prompt strings itself.

use serde::{Deserialize, Serialize};

use crate::analysis::chunker::ManuscriptChunk;
use crate::types::EditingMode;

/// A reference document attached to the analysis (character sheet, outline)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportingFile {
    pub name: String,
    pub content: String,
}

/// System prompt establishing the editor persona for a mode
pub fn system_prompt(mode: EditingMode) -> &'static str {
    match mode {
        EditingMode::Proofread => {
            "You are a professional proofreader and copy editor. Carefully review this manuscript for:\n\
             - Grammar errors\n\
             - Spelling mistakes\n\
             - Punctuation issues\n\
             - Sentence structure problems\n\
             - Typos and formatting inconsistencies\n\n\
             Provide a detailed report with:\n\
             1. Overall assessment of writing quality\n\
             2. Specific errors found (with line/paragraph references if possible)\n\
             3. Suggestions for corrections\n\
             4. Any patterns you notice in the errors\n\n\
             Be thorough but constructive. Focus on helping the author improve."
        }
        EditingMode::Style => {
            "You are a literary editor specializing in style and voice. Analyze this manuscript for:\n\
             - Sentence flow and rhythm\n\
             - Word choice and vocabulary\n\
             - Clarity and readability\n\
             - Tone consistency\n\
             - Repetitive phrases or clichés\n\
             - Opportunities for more vivid or precise language\n\n\
             Provide a detailed report with:\n\
             1. Overall style assessment\n\
             2. Strengths in the writing\n\
             3. Areas that could be enhanced\n\
             4. Specific examples with suggestions for improvement\n\
             5. General recommendations for elevating the prose\n\n\
             Be encouraging while offering actionable feedback."
        }
        EditingMode::Character => {
            "You are a character development specialist. Analyze this manuscript for:\n\
             - Character voice consistency\n\
             - Character behavior and motivation\n\
             - Dialogue authenticity\n\
             - Character development arcs\n\
             - Distinguishable character personalities\n\
             - Character relationships and dynamics\n\n\
             Provide a detailed report with:\n\
             1. Overview of main characters identified\n\
             2. Character voice consistency analysis\n\
             3. Strengths in character development\n\
             4. Areas where characters feel flat or inconsistent\n\
             5. Suggestions for deepening character authenticity\n\
             6. Dialogue improvements\n\n\
             Focus on helping characters feel real and distinct."
        }
        EditingMode::Chapter => {
            "You are a structural editor specializing in narrative structure. Analyze this manuscript for:\n\
             - Chapter structure and organization\n\
             - Pacing (too fast, too slow, uneven)\n\
             - Plot progression and logic\n\
             - Scene transitions\n\
             - Chapter hooks and endings\n\
             - Story momentum\n\
             - Plot holes or inconsistencies\n\n\
             Provide a detailed report with:\n\
             1. Overall structural assessment\n\
             2. Pacing analysis (chapter by chapter if applicable)\n\
             3. Strengths in structure\n\
             4. Areas where pacing drags or rushes\n\
             5. Plot issues or gaps\n\
             6. Suggestions for improving structure and flow\n\n\
             Be specific about what works and what needs adjustment."
        }
        EditingMode::Creative => {
            "You are a creative writing consultant. Analyze this manuscript and provide:\n\
             - Alternative phrasings for key passages\n\
             - Creative suggestions for scene development\n\
             - Ideas for enhancing imagery and description\n\
             - Possibilities for deeper emotional resonance\n\
             - Fresh angles on existing scenes\n\
             - Metaphors, similes, or literary devices that could enhance the writing\n\n\
             Provide a detailed report with:\n\
             1. Overall creative assessment\n\
             2. Specific passages that could be elevated (with alternatives)\n\
             3. Scenes that could be expanded or reimagined\n\
             4. Creative techniques the author could employ\n\
             5. Inspirational suggestions for taking the work further\n\n\
             Be imaginative and inspiring while respecting the author's vision."
        }
        EditingMode::Continuity => {
            "You are a continuity editor. Analyze this manuscript for:\n\
             - Timeline inconsistencies\n\
             - Contradictions in plot details\n\
             - Character detail inconsistencies (appearance, background, abilities)\n\
             - Setting/world-building contradictions\n\
             - Factual errors\n\
             - Logic gaps\n\
             - Forgotten plot threads\n\n\
             Provide a detailed report with:\n\
             1. Overall continuity assessment\n\
             2. Specific inconsistencies found (with references)\n\
             3. Timeline issues\n\
             4. Character detail contradictions\n\
             5. Plot logic problems\n\
             6. Suggestions for resolving inconsistencies\n\n\
             Be meticulous and help the author maintain internal consistency."
        }
    }
}

/// Per-chunk instructions, narrower in scope than the full-manuscript persona
fn chunk_instructions(mode: EditingMode) -> &'static str {
    match mode {
        EditingMode::Proofread => {
            "For PROOFREADING on this chunk:\n\
             1. Grammar errors\n\
             2. Spelling mistakes\n\
             3. Punctuation issues\n\
             4. Sentence structure problems\n\
             5. Typos and formatting inconsistencies\n\n\
             Focus on this specific section and provide line-by-line corrections where applicable."
        }
        EditingMode::Style => {
            "For STYLE analysis on this chunk:\n\
             1. Sentence flow and rhythm\n\
             2. Word choice and vocabulary\n\
             3. Clarity and readability\n\
             4. Tone consistency\n\
             5. Repetitive phrases or clichés\n\n\
             Provide specific examples from this chunk with suggestions for improvement."
        }
        EditingMode::Character => {
            "For CHARACTER CONSISTENCY on this chunk:\n\
             1. Character voice consistency\n\
             2. Character behavior and motivation\n\
             3. Dialogue authenticity\n\
             4. Character development\n\
             5. Character relationships\n\n\
             Focus on how characters are portrayed in this section."
        }
        EditingMode::Chapter => {
            "For CHAPTER STRUCTURE on this chunk:\n\
             1. Pacing (too fast, too slow, uneven)\n\
             2. Scene transitions\n\
             3. Chapter hooks and endings\n\
             4. Story momentum\n\
             5. Plot progression\n\n\
             Analyze the structure of this specific section."
        }
        EditingMode::Creative => {
            "For CREATIVE ENHANCEMENT on this chunk:\n\
             1. Alternative phrasings for key passages\n\
             2. Creative suggestions for scene development\n\
             3. Ideas for enhancing imagery and description\n\
             4. Possibilities for deeper emotional resonance\n\
             5. Fresh angles on existing scenes\n\n\
             Provide specific, actionable suggestions for this section."
        }
        EditingMode::Continuity => {
            "For CONTINUITY analysis on this chunk:\n\
             1. Identify any timeline inconsistencies within this section\n\
             2. Check for character detail contradictions (appearance, abilities, background)\n\
             3. Look for plot logic problems or gaps\n\
             4. Note any forgotten plot threads\n\
             5. Flag any world-building contradictions\n\n\
             IMPORTANT: focus on internal consistency within this chunk, and do\n\
             NOT assume information from other chunks unless explicitly referenced.\n\n\
             Format your response as a structured list of issues found."
        }
    }
}

/// Mode-specific focus for the aggregation pass
fn aggregation_guidance(mode: EditingMode) -> &'static str {
    match mode {
        EditingMode::Continuity => {
            "- Timeline inconsistencies across the ENTIRE manuscript\n\
             - Character detail contradictions that span multiple chunks\n\
             - Plot logic problems that emerge across sections\n\
             - Forgotten plot threads throughout the book\n\
             - World-building contradictions\n\
             - Provide a COMPREHENSIVE continuity report treating the entire manuscript as one cohesive work\n\
             - Identify issues that would only be visible when viewing the manuscript as a whole"
        }
        EditingMode::Proofread => {
            "- Recurring grammar patterns and errors\n\
             - Spelling and punctuation consistency issues\n\
             - Formatting problems that appear throughout\n\
             - Provide a comprehensive proofreading report with prioritized corrections"
        }
        EditingMode::Style => {
            "- Overall writing style consistency across the manuscript\n\
             - Recurring style issues and patterns\n\
             - Voice consistency throughout the book\n\
             - Provide recommendations for elevating the entire manuscript's style"
        }
        EditingMode::Character => {
            "- Character consistency across the ENTIRE manuscript\n\
             - Character development arcs from beginning to end\n\
             - Character voice consistency throughout\n\
             - Relationships and interactions across all sections\n\
             - Provide a comprehensive character analysis for the complete work"
        }
        EditingMode::Chapter => {
            "- Overall pacing across the entire manuscript\n\
             - Chapter structure consistency\n\
             - Plot progression from start to finish\n\
             - Provide structural recommendations for the complete book"
        }
        EditingMode::Creative => {
            "- Creative opportunities throughout the manuscript\n\
             - Recurring themes that could be enhanced\n\
             - Scenes that could be elevated across the book\n\
             - Provide creative suggestions for the entire work"
        }
    }
}

/// Prompt for analyzing one chunk in isolation
pub fn build_chunk_prompt(chunk: &ManuscriptChunk, total_chunks: usize, mode: EditingMode) -> String {
    let mut header = format!(
        "[CHUNK {} of {}]\nCharacter range: {} - {}\n",
        chunk.index + 1,
        total_chunks,
        chunk.start_offset,
        chunk.end_offset,
    );

    if !chunk.chapters.is_empty() {
        let titles: Vec<&str> = chunk.chapters.iter().map(|c| c.title.as_str()).collect();
        header.push_str(&format!("Chapters covered: {}\n", titles.join(", ")));
    }
    if chunk.index > 0 {
        header.push_str("NOTE: This chunk includes overlap from previous chunk for context continuity.\n");
    }
    if chunk.index + 1 < total_chunks {
        header.push_str("NOTE: This chunk includes overlap with next chunk for context continuity.\n");
    }

    format!(
        "{}\n{}\n\nMANUSCRIPT CHUNK:\n{}",
        header,
        chunk_instructions(mode),
        chunk.text
    )
}

/// Prompt for the direct (unchunked) path
pub fn build_direct_prompt(
    manuscript: &str,
    mode: EditingMode,
    supporting_files: &[SupportingFile],
    additional_instructions: Option<&str>,
) -> String {
    let mut prompt = format!(
        "{}\n\nHere is the manuscript to analyze:\n\n{}",
        system_prompt(mode),
        manuscript
    );

    if !supporting_files.is_empty() {
        prompt.push_str("\n\n--- SUPPORTING REFERENCE FILES ---\n");
        for file in supporting_files {
            prompt.push_str(&format!("\n[{}]\n{}\n", file.name, file.content));
        }
        prompt.push_str(
            "\nUse these reference files to inform your analysis (e.g., check character \
             consistency against character sheets, verify plot points against outlines, etc.).",
        );
    }

    if let Some(instructions) = additional_instructions
        && !instructions.trim().is_empty()
    {
        prompt.push_str(&format!(
            "\n\n--- AUTHOR'S SPECIFIC REQUESTS ---\n{}",
            instructions
        ));
    }

    prompt
}

/// Prompt that merges per-chunk findings into one unified report.
///
/// `analyses` are in chunk order; labels in the prompt are 1-based.
pub fn build_aggregation_prompt(analyses: &[String], mode: EditingMode) -> String {
    let chunk_sections: String = analyses
        .iter()
        .enumerate()
        .map(|(i, analysis)| format!("\n=== CHUNK {} ===\n{}\n", i + 1, analysis))
        .collect();

    format!(
        "You are an expert editor combining analysis results from {count} chunks of a large manuscript.\n\n\
         IMPORTANT: This is a comprehensive analysis combining results from all chunks. \
         Treat the manuscript as a COMPLETE WHOLE.\n\n\
         CHUNK ANALYSES ({count} chunks total):\n{sections}\n\
         Your task: Create a comprehensive, unified report that:\n\
         1. Consolidates findings across ALL {count} chunks\n\
         2. Identifies patterns and recurring issues throughout the manuscript\n\
         3. Highlights cross-chunk inconsistencies (CRITICAL for continuity analysis)\n\
         4. Prioritizes the most critical issues\n\
         5. Provides actionable recommendations\n\n\
         For {mode} analysis, focus on:\n{guidance}\n\n\
         Format your response as a professional, comprehensive report suitable for an author.\n\
         Include:\n\
         1. Executive Summary (2-3 paragraphs)\n\
         2. Key Findings (organized by category)\n\
         3. Patterns and Recurring Issues\n\
         4. Critical Issues Requiring Attention\n\
         5. Recommendations for Improvement\n\
         6. Conclusion\n\n\
         Be thorough, specific, and actionable.",
        count = analyses.len(),
        sections = chunk_sections,
        mode = mode,
        guidance = aggregation_guidance(mode),
    )
}
