use serde_json::json;

pub static TITLE_SUMMARY_SYSTEM_MESSAGE: &str = "\
You are an AI that extracts titles and summaries from documentation chunks.
Return a JSON object with 'title' and 'summary' keys.
For the title: If this seems like the start of a document, extract its title. If it's a middle chunk, derive a descriptive title.
For the summary: Create a concise summary of the main points in this chunk.
Keep both title and summary concise but informative.";

pub fn get_title_summary_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "title": { "type": "string" },
            "summary": { "type": "string" }
        },
        "required": ["title", "summary"],
        "additionalProperties": false
    })
}
