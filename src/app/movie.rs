use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::{debug, warn};

use super::infobox::{
    COUNTRY_LABEL, DIRECTOR_LABEL, GENRE_LABEL, InfoPanel, list_values, original_title,
    rating_site_link, year,
};
use super::rating::RatingLookup;
use super::text::{normalize_text, strip_film_suffix, with_year};
use super::types::MovieRecord;

static HEADING_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("h1.firstHeading, h1#firstHeading").expect("heading selector")
});

/// Everything a movie page yields before the rating lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieDraft {
    pub title: String,
    pub original_title: String,
    pub genre: Vec<String>,
    pub director: Vec<String>,
    pub country: Vec<String>,
    pub year: Option<String>,
    pub rating_link: Option<String>,
}

impl MovieDraft {
    /// Original-title query first, then the localized title; both carry the year when known.
    pub fn rating_queries(&self) -> [String; 2] {
        let year = self.year.as_deref();
        [
            with_year(&self.original_title, year),
            // Suffix stripped even when a year is appended.
            with_year(&strip_film_suffix(&self.title), year),
        ]
    }

    pub fn into_record(self, imdb_rating: Option<String>) -> MovieRecord {
        MovieRecord {
            title: self.title,
            original_title: self.original_title,
            genre: self.genre,
            director: self.director,
            country: self.country,
            year: self.year,
            imdb_rating,
        }
    }
}

/// Parses a movie page. `None` when the page has no title heading, which
/// usually means the fetch landed on an error page.
pub fn extract_movie(html: &str, ratings_host: &str) -> Option<MovieDraft> {
    let doc = Html::parse_document(html);
    let title = doc
        .select(&HEADING_SEL)
        .next()
        .map(|h1| normalize_text(&h1.text().collect::<String>()))
        .filter(|t| !t.is_empty())?;

    let panel = InfoPanel::find(&doc);
    let panel = panel.as_ref();

    Some(MovieDraft {
        original_title: original_title(&title, panel),
        genre: list_values(GENRE_LABEL, panel),
        director: list_values(DIRECTOR_LABEL, panel),
        country: list_values(COUNTRY_LABEL, panel),
        year: year(panel),
        rating_link: rating_site_link(panel, ratings_host),
        title,
    })
}

/// Applies the rating lookup policy and produces the final record. Lookup
/// failures are logged and leave the rating empty; they never drop the record.
pub async fn build_record(draft: MovieDraft, ratings: Option<&dyn RatingLookup>) -> MovieRecord {
    let Some(ratings) = ratings else {
        return draft.into_record(None);
    };

    let mut rating = None;
    for query in draft.rating_queries() {
        match ratings.rating(&query, draft.rating_link.as_deref()).await {
            Ok(Some(score)) => {
                rating = Some(score);
                break;
            }
            Ok(None) => debug!(title = %draft.title, query = %query, "no rating"),
            Err(err) => {
                warn!(title = %draft.title, query = %query, error = %err, "rating lookup failed")
            }
        }
    }
    draft.into_record(rating)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::app::error::FetchError;

    const HOST: &str = "https://www.imdb.com";

    const AMELIE_PAGE: &str = r#"<html><body>
        <h1 id="firstHeading" class="firstHeading">Амели (фильм, 2001)</h1>
        <table class="infobox"><tbody>
          <tr><th colspan="2">Амели</th></tr>
          <tr><td colspan="2"><span lang="fr">Le Fabuleux Destin d'Amélie Poulain</span></td></tr>
          <tr><td colspan="2"><img src="poster.jpg"></td></tr>
          <tr><th>Жанр</th><td><a href="/wiki/romcom">романтическая комедия</a></td></tr>
          <tr><th>Режиссёр</th><td><a href="/wiki/jpj">Жан-Пьер Жёне</a></td></tr>
          <tr><th>Страны</th><td><span>Франция</span><br><span>Германия</span><span>[1]</span></td></tr>
          <tr><th>Год</th><td><a href="/wiki/2001">2001</a></td></tr>
          <tr><th>IMDb</th><td><a href="https://www.wikidata.org/wiki/Q484048">ID 0211915</a></td></tr>
        </tbody></table></body></html>"#;

    /// Answers only the queries it was primed with; records every call.
    #[derive(Default)]
    struct StubRatings {
        answers: Vec<(String, Result<Option<String>, u16>)>,
        calls: Mutex<Vec<String>>,
    }

    impl StubRatings {
        fn answer(mut self, query: &str, answer: Result<Option<&str>, u16>) -> Self {
            self.answers
                .push((query.to_string(), answer.map(|a| a.map(str::to_string))));
            self
        }
    }

    #[async_trait]
    impl RatingLookup for StubRatings {
        async fn rating(
            &self,
            query: &str,
            _known_link: Option<&str>,
        ) -> Result<Option<String>, FetchError> {
            self.calls.lock().unwrap().push(query.to_string());
            match self.answers.iter().find(|(q, _)| q == query) {
                Some((_, Ok(answer))) => Ok(answer.clone()),
                Some((_, Err(status))) => Err(FetchError::Status {
                    url: query.to_string(),
                    status: *status,
                }),
                None => Ok(None),
            }
        }
    }

    #[test]
    fn extracts_all_fields() {
        let draft = extract_movie(AMELIE_PAGE, HOST).unwrap();
        assert_eq!(draft.title, "Амели (фильм, 2001)");
        assert_eq!(draft.original_title, "Le Fabuleux Destin d'Amélie Poulain");
        assert_eq!(draft.genre, vec!["романтическая комедия"]);
        assert_eq!(draft.director, vec!["Жан-Пьер Жёне"]);
        assert_eq!(draft.country, vec!["Франция", "Германия"]);
        assert_eq!(draft.year.as_deref(), Some("2001"));
        assert_eq!(
            draft.rating_link.as_deref(),
            Some("https://www.imdb.com/title/tt0211915/")
        );
        assert_eq!(
            draft.rating_queries(),
            [
                "Le Fabuleux Destin d'Amélie Poulain (2001)".to_string(),
                "Амели (2001)".to_string()
            ]
        );
    }

    #[test]
    fn localized_query_drops_film_suffix_even_with_year() {
        let draft = extract_movie(AMELIE_PAGE, HOST).unwrap();
        let [_, localized] = draft.rating_queries();
        assert_eq!(localized, "Амели (2001)");
        assert!(!localized.contains("фильм"));
    }

    #[test]
    fn page_without_heading_is_rejected() {
        assert_eq!(extract_movie("<html><body><p>503</p></body></html>", HOST), None);
    }

    #[test]
    fn page_without_panel_keeps_title_only() {
        let html = r#"<h1 class="firstHeading">Сталкер (фильм)</h1><p>text</p>"#;
        let draft = extract_movie(html, HOST).unwrap();
        assert_eq!(draft.original_title, "Сталкер");
        assert!(draft.genre.is_empty() && draft.director.is_empty() && draft.country.is_empty());
        assert_eq!(draft.year, None);
        assert_eq!(draft.rating_link, None);
        assert_eq!(draft.rating_queries(), ["Сталкер".to_string(), "Сталкер".to_string()]);
    }

    #[tokio::test]
    async fn first_successful_query_wins() {
        let draft = extract_movie(AMELIE_PAGE, HOST).unwrap();
        let ratings = StubRatings::default()
            .answer("Le Fabuleux Destin d'Amélie Poulain (2001)", Ok(None))
            .answer("Амели (2001)", Ok(Some("8.3")));
        let record = build_record(draft, Some(&ratings)).await;
        assert_eq!(record.imdb_rating.as_deref(), Some("8.3"));
        assert_eq!(ratings.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn localized_query_skipped_after_hit() {
        let draft = extract_movie(AMELIE_PAGE, HOST).unwrap();
        let ratings = StubRatings::default()
            .answer("Le Fabuleux Destin d'Amélie Poulain (2001)", Ok(Some("8.3")));
        let record = build_record(draft, Some(&ratings)).await;
        assert_eq!(record.imdb_rating.as_deref(), Some("8.3"));
        assert_eq!(ratings.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn lookup_failure_keeps_record() {
        let draft = extract_movie(AMELIE_PAGE, HOST).unwrap();
        let ratings = StubRatings::default()
            .answer("Le Fabuleux Destin d'Amélie Poulain (2001)", Err(503))
            .answer("Амели (2001)", Err(503));
        let record = build_record(draft, Some(&ratings)).await;
        assert_eq!(record.title, "Амели (фильм, 2001)");
        assert_eq!(record.imdb_rating, None);
    }

    #[tokio::test]
    async fn ratings_disabled() {
        let draft = extract_movie(AMELIE_PAGE, HOST).unwrap();
        let record = build_record(draft, None).await;
        assert_eq!(record.imdb_rating, None);
        assert_eq!(record.year.as_deref(), Some("2001"));
    }
}
